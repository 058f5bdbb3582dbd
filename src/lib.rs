#![recursion_limit = "256"]

//! Transformer language model ("Attention Is All You Need") on burn.
//!
//! Layers, outermost first:
//!
//! | layer | module        | role                                     |
//! |-------|---------------|------------------------------------------|
//! | 1     | `cli`         | clap commands                            |
//! | 2     | `application` | prepare / train / generate use cases     |
//! | 3     | `domain`      | plain types and traits                   |
//! | 4     | `data`        | corpus → windows → batches               |
//! | 5     | `ml`          | attention, models, training, sampling    |
//! | 6     | `infra`       | checkpoints, tokenizer, metrics, logging |

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
