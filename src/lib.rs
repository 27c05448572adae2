// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) wires the modules together into the dump flow.
//
// Module responsibilities:
// - `api`: Encapsulates HTTP interactions with the GZCTF instance
//   (login, game listing, challenge catalog, attachment streaming).
// - `ui`: Console reporting, interactive prompts and game selection,
//   behind traits so tests can script the interaction.
// - `dump`: The orchestrator that mirrors one game to local disk.
//
// Keeping this separation makes it possible to test selection and dump
// behavior without a terminal or a live instance.
pub mod api;
pub mod dump;
pub mod ui;
