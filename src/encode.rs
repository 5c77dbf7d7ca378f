pub mod ffmpeg;
pub mod loop_export;
pub mod png;
