pub mod module;
pub mod pix;
pub mod token;
