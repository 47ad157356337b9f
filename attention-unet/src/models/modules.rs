mod attention_gate;
mod conv_block;
mod decoder_blocks;
mod encoder_blocks;
mod norm;
mod position_attention;

pub use attention_gate::*;
pub use conv_block::*;
pub use decoder_blocks::*;
pub use encoder_blocks::*;
pub use norm::*;
pub use position_attention::*;
