//! WebAssembly bindings for the match engine.
//!
//! This module exposes the engine to JavaScript through wasm-bindgen.

use wasm_bindgen::prelude::*;

use crate::bot::{Bot, BotDifficulty};
use crate::engine::MatchEngine;
use crate::level::LevelConfig;
use crate::position::Position;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WASM-exposed engine wrapper
#[wasm_bindgen]
pub struct WasmEngine {
    engine: MatchEngine,
}

#[wasm_bindgen]
impl WasmEngine {
    /// Start a level with a random board
    #[wasm_bindgen(constructor)]
    pub fn new(level: i32) -> WasmEngine {
        WasmEngine {
            engine: MatchEngine::new(LevelConfig::for_level(level)),
        }
    }

    /// Start a level whose board and refills are reproducible
    #[wasm_bindgen(js_name = withSeed)]
    pub fn with_seed(level: i32, seed: u64) -> WasmEngine {
        WasmEngine {
            engine: MatchEngine::seeded(LevelConfig::for_level(level), seed),
        }
    }

    /// Get the full engine snapshot as JSON
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        serde_json::to_string(&self.engine.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Current score
    #[wasm_bindgen(js_name = getScore)]
    pub fn get_score(&self) -> u32 {
        self.engine.score()
    }

    /// Whether the level target has been reached
    #[wasm_bindgen(js_name = isLevelComplete)]
    pub fn is_level_complete(&self) -> bool {
        self.engine.is_level_complete()
    }

    /// Swap two cells; returns the events JSON or an error message
    #[wasm_bindgen(js_name = performMove)]
    pub fn perform_move(
        &mut self,
        from_row: i32,
        from_col: i32,
        to_row: i32,
        to_col: i32,
    ) -> Result<String, JsValue> {
        let from = Position::new(from_row, from_col);
        let to = Position::new(to_row, to_col);

        match self.engine.try_move(from, to) {
            Ok(outcome) => {
                Ok(serde_json::to_string(&outcome.events).unwrap_or_else(|_| "[]".to_string()))
            }
            Err(e) => Err(JsValue::from_str(&format!("Move rejected: {}", e))),
        }
    }

    /// Whether any accepted move exists
    #[wasm_bindgen(js_name = hasMoves)]
    pub fn has_moves(&self) -> bool {
        self.engine.has_available_moves()
    }

    /// Suggested move as JSON, or "null"
    /// difficulty: "Easy", "Medium", or "Hard"
    #[wasm_bindgen(js_name = getHint)]
    pub fn get_hint(&self, difficulty: &str) -> String {
        let diff = match difficulty {
            "Easy" => BotDifficulty::Easy,
            "Hard" => BotDifficulty::Hard,
            _ => BotDifficulty::Medium,
        };

        let mut bot = Bot::new(diff);
        match bot.choose_move(&self.engine) {
            Some(mv) => serde_json::to_string(&mv).unwrap_or_else(|_| "null".to_string()),
            None => "null".to_string(),
        }
    }
}
