//! The built-in prelude
//!
//! The prelude is host source parsed with the regular parser, so built-in
//! classes and functions are looked up exactly like user declarations.

use rk_intern::Interner;
use rk_ir::{FunctionSignature, SourceFile, SymbolTable};
use rk_parser::ParseError;
use rk_span::FileId;

/// Source text of the prelude
pub const PRELUDE_SOURCE: &str = include_str!("prelude.kt");

/// Parses the prelude
///
/// # Errors
///
/// Fails only if the prelude itself is malformed.
pub fn prelude(interner: &Interner) -> Result<SourceFile, ParseError> {
    rk_parser::parse_file(PRELUDE_SOURCE, FileId::PRELUDE, interner)
}

/// Symbol table of `file` layered over the prelude. Declarations of the file
/// shadow prelude classes of the same name.
///
/// # Errors
///
/// Fails only if the prelude itself is malformed.
pub fn build_symbols(interner: &Interner, file: &SourceFile) -> Result<SymbolTable, ParseError> {
    let mut table = SymbolTable::new(interner);
    for decl in &prelude(interner)?.decls {
        table.insert(decl);
    }
    for decl in &file.decls {
        table.insert(decl);
    }
    Ok(table)
}

/// Whether the signature belongs to the prelude, whose bodies are native
#[must_use]
pub fn is_native(signature: &FunctionSignature) -> bool {
    signature.span.file == FileId::PRELUDE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_parses_and_declares_collections() {
        let interner = Interner::new();
        let file = SourceFile::new(FileId(0));
        let table = build_symbols(&interner, &file).expect("prelude parses");
        let list = table.class(interner.intern("List")).expect("List");
        assert_eq!(list.type_params.len(), 1);
        assert!(!table.functions(interner.intern("listOf")).is_empty());
        let to = &table.functions(interner.intern("to"))[0];
        assert!(to.receiver.is_some());
        assert!(is_native(to));
        assert!(table.functions(interner.intern("map"))[0].is_inline());
    }
}
