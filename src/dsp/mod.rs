pub mod convolver;
pub mod feature;
pub mod history;
pub mod ir_bank;
pub mod ir_buffer;
pub mod ir_synth;
pub mod living_ir;
pub mod lofi;
pub mod post;
pub mod rng;
pub mod stability;
pub mod utils;

pub use convolver::{BandSplitter, Bands, ConvolveParams};
pub use feature::FeatureTracker;
pub use history::HistoryBuffers;
pub use ir_bank::{BankHalf, IrBank};
pub use ir_buffer::{IrBuffer, MAX_IR_LEN};
pub use living_ir::{LivingIr, StuckBand, TickContext};
pub use lofi::{LoFiFrame, LoFiTransport};
pub use rng::EngineRng;
pub use stability::{CvFilterTime, CvSmoothing, StabilityCvShaper};
