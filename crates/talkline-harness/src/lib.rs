//! Test harness for the talkline client.
//!
//! Everything needed to drive the real client code against a real socket
//! without a terminal:
//!
//! - [`SimServer`]: a scriptable server on a loopback port, plain or TLS with
//!   an `rcgen` certificate (self-signed, or issued by a throwaway CA)
//! - [`ScriptedPrompt`], [`RecordingScreen`], [`ScriptedTrust`]: console
//!   capabilities fed from the test and recording what the client shows
//! - [`RecordingStream`]: a stream wrapper that logs every write together with
//!   the state of the shutdown signal at the time of the write
//! - [`FaultyStream`]: a peerless stream whose reads or writes always fail

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod console;
pub mod recording;
pub mod sim_server;

pub use console::{RecordingScreen, ScreenEvent, ScriptHandle, ScriptedPrompt, ScriptedTrust};
pub use recording::{Fault, FaultyStream, RecordingStream, WriteLog, WriteRecord};
pub use sim_server::{HarnessError, SimConnection, SimServer, TestCa};
