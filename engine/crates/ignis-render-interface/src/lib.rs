//! 渲染数据接口层
//!
//! 定义渲染管线每帧消费的数据形态：
//! 绘制队列与排序 key、frames-in-flight 计数、
//! 上传到 GPU 的常量结构，以及场景侧的网格实例记录。

pub mod draw_queue;
pub mod frame_counter;
pub mod pipeline_settings;
pub mod render_data;
pub mod scene;
