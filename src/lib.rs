//! Quorum is a chat client front-end that routes prompts to hosted AI models
//! through a single upstream gateway.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation log, model catalog, streaming decode,
//!   single-model dispatch, and the compare/council orchestrators.
//! - [`cli`] implements the one-shot command-line front-end and model
//!   listing; richer front-ends are external collaborators that drive
//!   [`core::session::ChatSession`] the same way.
//! - [`api`] defines the chat and model-listing payloads exchanged with the
//!   gateway.
//! - [`utils`] holds URL helpers shared by dispatch and listing code.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
