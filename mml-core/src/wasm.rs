//! WASM bindings for mml-core
//!
//! Lets a browser worker compile scores and receive notes as plain objects.

#[cfg(feature = "wasm")]
use crate::parser::compiler::compile as compile_text;
#[cfg(feature = "wasm")]
use crate::parser::diagnostic::locate;
#[cfg(feature = "wasm")]
use crate::parser::error::MmlError;
#[cfg(feature = "wasm")]
use crate::types::note::Note;
#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

/// Compile error shaped for JavaScript consumers
#[cfg(feature = "wasm")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompileErrorJS {
    pub message: String,
    pub clause: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

#[cfg(feature = "wasm")]
impl CompileErrorJS {
    fn new(source: &str, error: &MmlError) -> Self {
        let location = locate(source, error.offset());
        CompileErrorJS {
            message: error.to_string(),
            clause: error.clause().to_string(),
            offset: error.offset(),
            line: location.line,
            column: location.column,
        }
    }
}

#[cfg(feature = "wasm")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompileResult {
    pub success: bool,
    pub notes: Vec<Note>,
    pub error: Option<CompileErrorJS>,
}

/// Compile MML text; never throws, failures are reported in the result
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub fn compile(input: &str) -> JsValue {
    let result = match compile_text(input) {
        Ok(notes) => CompileResult {
            success: true,
            notes,
            error: None,
        },
        Err(e) => CompileResult {
            success: false,
            notes: vec![],
            error: Some(CompileErrorJS::new(input, &e)),
        },
    };
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

/// Total length in milliseconds of a score, or -1 if it does not compile
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub fn score_length(input: &str) -> f64 {
    match compile_text(input) {
        Ok(notes) => crate::types::note::end_time(&notes) as f64,
        Err(_) => -1.0,
    }
}
