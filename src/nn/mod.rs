mod init;
mod linear;
mod embedding;
mod gru;

pub use init::ParamInit;
pub use linear::Linear;
pub use embedding::Embedding;
pub use gru::{Gru, GruCell};
