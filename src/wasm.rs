use crate::config::FeedConfig;
use crate::error::{FeedError, Result as FeedResult};
use crate::notes::NoteBook;
use crate::relays::{RelayAddress, RelayStore};
use crate::storage::Storage;
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn relay_store<S: Storage>(storage: S, config: &FeedConfig) -> FeedResult<(RelayStore<S>, RelayAddress)> {
    let default = RelayAddress::parse(&config.default_relay)?;
    Ok((RelayStore::new(storage, config.storage_key.clone()), default))
}

/// Saved relay list (or the default) as a JSON array
pub fn list_relays_core<S: Storage>(storage: S, config: &FeedConfig) -> FeedResult<String> {
    let (store, default) = relay_store(storage, config)?;
    let relays = store.load_or(&default);
    Ok(serde_json::to_string(&relays.to_vec())?)
}

/// Add a relay to the saved list and return the new list as JSON
pub fn add_relay_core<S: Storage>(storage: S, config: &FeedConfig, url: &str) -> FeedResult<String> {
    let (store, default) = relay_store(storage, config)?;
    let mut relays = store.load_or(&default);

    let relay = RelayAddress::parse(url)?;
    if !relays.insert(relay.clone()) {
        return Err(FeedError::DuplicateAddress(relay.to_string()));
    }
    store.save(&relays)?;
    Ok(serde_json::to_string(&relays.to_vec())?)
}

pub fn clear_relays_core<S: Storage>(storage: S, config: &FeedConfig) -> FeedResult<()> {
    let (store, _) = relay_store(storage, config)?;
    store.clear()
}

// WASM-exposed relay list functions

#[wasm_bindgen]
pub fn wasm_list_relays() -> Result<String, JsValue> {
    #[cfg(target_arch = "wasm32")]
    {
        use crate::storage::LocalStorageImpl;
        list_relays_core(LocalStorageImpl, &FeedConfig::default())
            .map_err(|e| JsValue::from_str(&format!("Error: {}", e)))
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Err(JsValue::from_str("WASM functions only available in WASM target"))
    }
}

#[wasm_bindgen]
pub fn wasm_add_relay(url: String) -> Result<String, JsValue> {
    #[cfg(target_arch = "wasm32")]
    {
        use crate::storage::LocalStorageImpl;
        add_relay_core(LocalStorageImpl, &FeedConfig::default(), &url)
            .map_err(|e| JsValue::from_str(&format!("Error: {}", e)))
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = url;
        Err(JsValue::from_str("WASM functions only available in WASM target"))
    }
}

#[wasm_bindgen]
pub fn wasm_clear_relays() -> Result<(), JsValue> {
    #[cfg(target_arch = "wasm32")]
    {
        use crate::storage::LocalStorageImpl;
        clear_relays_core(LocalStorageImpl, &FeedConfig::default())
            .map_err(|e| JsValue::from_str(&format!("Error: {}", e)))
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Err(JsValue::from_str("WASM functions only available in WASM target"))
    }
}

// WASM-exposed note book

/// Session note book for the browser page
#[wasm_bindgen]
pub struct WasmNoteBook {
    book: NoteBook,
}

impl Default for WasmNoteBook {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl WasmNoteBook {
    /// Starts with the welcome note
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            book: NoteBook::with_welcome(),
        }
    }

    /// All notes, newest first, as a JSON array
    pub fn list(&self) -> Result<String, JsValue> {
        to_json(self.book.list())
    }

    pub fn add(&mut self, title: &str, content: &str) -> Result<String, JsValue> {
        let note = self.book.add(title, content).map_err(to_js_error)?;
        to_json(note)
    }

    pub fn update(&mut self, id: &str, title: &str, content: &str) -> Result<String, JsValue> {
        let note = self.book.update(id, title, content).map_err(to_js_error)?;
        to_json(note)
    }

    /// Remove a note and return it as JSON
    pub fn delete(&mut self, id: &str) -> Result<String, JsValue> {
        let note = self.book.delete(id).map_err(to_js_error)?;
        to_json(&note)
    }
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("Error: {}", e))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(to_js_error)
}
