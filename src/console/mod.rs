//! Serial console command subsystem.
//!
//! Line-oriented, human-readable protocol over UART (or any byte
//! stream).  Commands arrive as `CMD:<NAME>[:<ARG>]\n` and every
//! command produces exactly one reply line.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Console Stack                         │
//! │                                                          │
//! │  ┌──────────┐   ┌───────────┐   ┌────────────────────┐  │
//! │  │ UART RX  │──▶│   Codec   │──▶│ Engine (dispatcher)│  │
//! │  │ (bytes)  │   │ (lines +  │   │  → AppService      │  │
//! │  └──────────┘   │  parsing) │   └─────────┬──────────┘  │
//! │       ▲         └───────────┘             │             │
//! │       │                                   ▼             │
//! │  ┌──────────┐                      ┌────────────┐       │
//! │  │ UART TX  │◀─────────────────────│ Reply line │       │
//! │  └──────────┘                      └────────────┘       │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod engine;

pub use codec::{parse_command, LineAccumulator, ParseError};
pub use engine::ConsoleEngine;
