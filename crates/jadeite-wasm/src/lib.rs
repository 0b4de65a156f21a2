//! WASM bindings for the jadeite compiler.
//!
//! Exposes `compile()` and `tokenize()` to JavaScript via wasm-bindgen.
//! Compilation uses the default tables, the built-in filters and the
//! autotags visitor.

use jadeite_codegen::Compiler;
use jadeite_lexer::Lexer;
use wasm_bindgen::prelude::*;

/// Compile template source to markup.
///
/// Throws a JS error if lexing, parsing or rendering fails.
#[wasm_bindgen]
pub fn compile(source: &str) -> Result<String, JsError> {
    Compiler::with_defaults()
        .compile(source)
        .map_err(|e| JsError::new(&e.to_string()))
}

/// Token kinds of the source, one `"kind@line"` string per token.
#[wasm_bindgen]
pub fn tokenize(source: &str) -> Result<js_sys::Array, JsError> {
    let tokens = Lexer::tokenize(source).map_err(|e| JsError::new(&e.to_string()))?;

    let array = js_sys::Array::new();
    for token in &tokens {
        array.push(&JsValue::from_str(&format!(
            "{}@{}",
            token.kind.name(),
            token.line
        )));
    }

    Ok(array)
}

/// Get the compiler version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
