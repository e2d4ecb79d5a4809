pub mod openai;
pub mod presets;
