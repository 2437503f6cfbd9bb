//! Answer contracts
//!
//! A contract fixes tone, structure and refusal language of the generated
//! answer for one routing mode. The registry is built once at start-up and
//! only read afterwards.

mod registry;

pub use registry::{
    AnswerContract, AnswerContractRegistry, ContractOverride, DEFAULT_SYSTEM_TEMPLATE,
};
