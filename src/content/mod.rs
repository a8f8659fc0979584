//! Built-in entry types: blocks and items

mod block;
mod item;

pub use block::{
    block_loot_path, block_model_path, blockstate_model, blockstate_path, Block,
    BlockBuilderExt, BlockProperties,
};
pub use item::{item_model_path, Item, ItemBuilderExt, ItemProperties, MAX_STACK_SIZE};
