pub mod memory;
pub mod modarith;
pub mod model;
pub mod multiregister;
pub mod runtime;
pub mod trace;

pub use memory::{RegisterFile, UnallocatedRead, DEFAULT_REGISTER_WIDTH};
pub use modarith::{montgomery_add, montgomery_mul, Lane};
pub use model::{FunctionalModel, MemoryImageError, ModelError, TwiddleMap, TwiddleTable};
pub use multiregister::{MultiRegister, SizeMismatch};
pub use runtime::{ProgramRuntime, RuntimeError};
pub use trace::InstructionTrace;
