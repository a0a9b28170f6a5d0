//! Global toggle hotkey.
//!
//! `global-hotkey` delivers events on a process-wide crossbeam channel. A
//! bridge thread filters them down to presses of our hotkey and forwards
//! each one to the coordinator as a toggle.

use std::thread::JoinHandle;

use crossbeam_channel::{select, Sender};
use global_hotkey::hotkey::{HotKey, HotKeyParseError};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};

use crate::errors::RecorderError;
use crate::recorder::CoordinatorHandle;
use crate::settings::SettingsError;

/// Parse a hotkey string (e.g. "shift+super+KeyV", "F9").
pub fn parse_hotkey(hotkey: &str) -> Result<HotKey, SettingsError> {
    hotkey
        .parse()
        .map_err(|e: HotKeyParseError| SettingsError::HotkeyParseError(e.to_string()))
}

/// Registered hotkey plus the thread forwarding its presses.
///
/// Must be created and dropped on the same thread (the manager is not
/// `Send` on every platform). Dropping unregisters the hotkey.
pub struct HotkeyBridge {
    manager: GlobalHotKeyManager,
    hotkey: HotKey,
    shutdown_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl HotkeyBridge {
    pub fn start(hotkey: &str, handle: CoordinatorHandle) -> Result<Self, RecorderError> {
        let hotkey = parse_hotkey(hotkey).map_err(|e| RecorderError::Settings(e.to_string()))?;

        let manager = GlobalHotKeyManager::new()
            .map_err(|e| RecorderError::Hotkey(format!("Failed to create hotkey manager: {}", e)))?;
        manager
            .register(hotkey)
            .map_err(|e| RecorderError::Hotkey(format!("Failed to register {:?}: {}", hotkey, e)))?;

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let id = hotkey.id();

        let thread = std::thread::Builder::new()
            .name("regionreel-hotkey".to_string())
            .spawn(move || {
                let events = GlobalHotKeyEvent::receiver();
                loop {
                    select! {
                        recv(events) -> event => match event {
                            Ok(event) if event.id == id && event.state == HotKeyState::Pressed => {
                                match handle.blocking_toggle() {
                                    Ok(phase) => tracing::info!(target: "session", "[HOTKEY] Toggle -> {}", phase),
                                    Err(RecorderError::CoordinatorStopped) => break,
                                    Err(e) => tracing::info!(target: "session", "[HOTKEY] Toggle rejected: {}", e),
                                }
                            }
                            Ok(_) => {}
                            Err(_) => break,
                        },
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                tracing::debug!(target: "session", "[HOTKEY] Bridge thread exiting");
            })
            .map_err(|e| RecorderError::Hotkey(format!("Failed to spawn hotkey thread: {}", e)))?;

        tracing::info!(target: "session", "[HOTKEY] Registered toggle hotkey {:?}", hotkey);

        Ok(Self {
            manager,
            hotkey,
            shutdown_tx,
            thread: Some(thread),
        })
    }
}

impl Drop for HotkeyBridge {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.try_send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        if let Err(e) = self.manager.unregister(self.hotkey) {
            tracing::warn!(target: "session", "[HOTKEY] Failed to unregister hotkey: {}", e);
        }
    }
}
