//! Import specifier scanner.
//!
//! Finds static imports, re-exports and string-literal dynamic imports in
//! JavaScript/TypeScript source without a full parse. Each hit carries the
//! byte span of the specifier text (quotes excluded) so the rewriter can
//! overwrite it in place.

/// How the specifier was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from "..."` or `import "..."`.
    Static,
    /// `export ... from "..."`.
    ReExport,
    /// `import("...")`.
    Dynamic,
}

/// An import specifier found in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    /// Specifier exactly as written.
    pub specifier: String,
    /// Byte offset of the first specifier character.
    pub start: usize,
    /// Byte offset one past the last specifier character.
    pub end: usize,
    /// Statement kind.
    pub kind: ImportKind,
}

/// Scan source code for import/export specifiers.
///
/// Returns every occurrence in source order; duplicates are kept because
/// each occurrence has its own span to rewrite.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportSpecifier> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut results = Vec::new();
    let mut i = 0;

    while i < len {
        let b = bytes[i];

        if b == b'/' && i + 1 < len && (bytes[i + 1] == b'/' || bytes[i + 1] == b'*') {
            i = skip_comment(bytes, i);
            continue;
        }

        if b == b'\'' || b == b'"' || b == b'`' {
            i = skip_string(bytes, i);
            continue;
        }

        if matches_keyword(bytes, i, b"import") {
            if let Some((start, end, kind, next)) = scan_import(bytes, i + 6) {
                results.push(ImportSpecifier {
                    specifier: source[start..end].to_string(),
                    start,
                    end,
                    kind,
                });
                i = next;
            } else {
                i += 6;
            }
            continue;
        }

        if matches_keyword(bytes, i, b"export") {
            if let Some((start, end, next)) = scan_export_from(bytes, i + 6) {
                results.push(ImportSpecifier {
                    specifier: source[start..end].to_string(),
                    start,
                    end,
                    kind: ImportKind::ReExport,
                });
                i = next;
            } else {
                i += 6;
            }
            continue;
        }

        i += 1;
    }

    results
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Check if bytes at position match a keyword (with word boundary).
///
/// A preceding `.` also disqualifies the match so `obj.import(...)` is skipped.
fn matches_keyword(bytes: &[u8], pos: usize, keyword: &[u8]) -> bool {
    let end = pos + keyword.len();
    if end > bytes.len() || &bytes[pos..end] != keyword {
        return false;
    }
    if pos > 0 && (is_ident_byte(bytes[pos - 1]) || bytes[pos - 1] == b'.') {
        return false;
    }
    !(end < bytes.len() && is_ident_byte(bytes[end]))
}

/// Skip a `//` or `/* */` comment starting at `pos`.
fn skip_comment(bytes: &[u8], pos: usize) -> usize {
    let len = bytes.len();
    if bytes[pos + 1] == b'/' {
        let mut i = pos + 2;
        while i < len && bytes[i] != b'\n' {
            i += 1;
        }
        return i;
    }
    let mut i = pos + 2;
    while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
        i += 1;
    }
    (i + 2).min(len)
}

/// Skip a string or template literal starting at `pos`.
fn skip_string(bytes: &[u8], pos: usize) -> usize {
    let quote = bytes[pos];
    let len = bytes.len();
    let mut i = pos + 1;
    while i < len {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            b'\n' if quote != b'`' => return i + 1,
            _ => i += 1,
        }
    }
    len
}

/// Skip whitespace and comments.
fn skip_trivia(bytes: &[u8], mut pos: usize) -> usize {
    let len = bytes.len();
    while pos < len {
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
        } else if bytes[pos] == b'/' && pos + 1 < len && matches!(bytes[pos + 1], b'/' | b'*') {
            pos = skip_comment(bytes, pos);
        } else {
            break;
        }
    }
    pos
}

/// Read a `'...'` or `"..."` literal at `pos`.
///
/// Returns (content start, content end, position after the closing quote).
fn read_literal(bytes: &[u8], pos: usize) -> Option<(usize, usize, usize)> {
    let quote = *bytes.get(pos)?;
    if quote != b'\'' && quote != b'"' {
        return None;
    }
    let start = pos + 1;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b if b == quote => return Some((start, i, i + 1)),
            _ => i += 1,
        }
    }
    None
}

/// Expect `from "<specifier>"` at `pos`.
fn read_from_clause(bytes: &[u8], pos: usize) -> Option<(usize, usize, usize)> {
    let pos = skip_trivia(bytes, pos);
    if !matches_keyword(bytes, pos, b"from") {
        return None;
    }
    read_literal(bytes, skip_trivia(bytes, pos + 4))
}

/// Scan what follows an `import` keyword.
fn scan_import(bytes: &[u8], pos: usize) -> Option<(usize, usize, ImportKind, usize)> {
    let len = bytes.len();
    let mut i = skip_trivia(bytes, pos);
    let first = *bytes.get(i)?;

    // Dynamic import: only plain string literals are rewritable.
    if first == b'(' {
        let (start, end, next) = read_literal(bytes, skip_trivia(bytes, i + 1))?;
        let after = skip_trivia(bytes, next);
        return match bytes.get(after) {
            Some(b')' | b',') => Some((start, end, ImportKind::Dynamic, next)),
            _ => None,
        };
    }

    // import.meta
    if first == b'.' {
        return None;
    }

    // Side-effect import: import "specifier"
    if let Some((start, end, next)) = read_literal(bytes, i) {
        return Some((start, end, ImportKind::Static, next));
    }

    // Import clause: identifiers, braces, commas and `*` up to `from`.
    while i < len {
        i = skip_trivia(bytes, i);
        if i >= len {
            break;
        }
        if matches_keyword(bytes, i, b"from") {
            if let Some((start, end, next)) = read_literal(bytes, skip_trivia(bytes, i + 4)) {
                return Some((start, end, ImportKind::Static, next));
            }
            // `from` used as a binding name
            i += 4;
            continue;
        }
        match bytes[i] {
            b'{' | b'}' | b',' | b'*' => i += 1,
            b if is_ident_byte(b) => {
                while i < len && is_ident_byte(bytes[i]) {
                    i += 1;
                }
            }
            _ => return None,
        }
    }

    None
}

/// Scan what follows an `export` keyword for a re-export.
fn scan_export_from(bytes: &[u8], pos: usize) -> Option<(usize, usize, usize)> {
    let len = bytes.len();
    let mut i = skip_trivia(bytes, pos);

    // export type { X } from "..."
    if matches_keyword(bytes, i, b"type") {
        i = skip_trivia(bytes, i + 4);
    }

    match *bytes.get(i)? {
        b'*' => {
            i = skip_trivia(bytes, i + 1);
            if matches_keyword(bytes, i, b"as") {
                i = skip_trivia(bytes, i + 2);
                if let Some((_, _, next)) = read_literal(bytes, i) {
                    i = next;
                } else {
                    while i < len && is_ident_byte(bytes[i]) {
                        i += 1;
                    }
                }
            }
            read_from_clause(bytes, i)
        }
        b'{' => {
            i += 1;
            while i < len && bytes[i] != b'}' {
                if bytes[i] == b'\'' || bytes[i] == b'"' {
                    i = skip_string(bytes, i);
                } else if bytes[i] == b'/' && i + 1 < len && matches!(bytes[i + 1], b'/' | b'*') {
                    i = skip_comment(bytes, i);
                } else {
                    i += 1;
                }
            }
            read_from_clause(bytes, i + 1)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specifiers(source: &str) -> Vec<String> {
        scan_imports(source)
            .into_iter()
            .map(|s| s.specifier)
            .collect()
    }

    #[test]
    fn test_import_forms() {
        let source = r#"
import React from "react";
import { useState, useEffect as effect } from 'react';
import * as utils from "./utils";
import def, { named } from "./mixed";
import "./polyfill";
import type { Props } from "./types";
"#;
        assert_eq!(
            specifiers(source),
            vec!["react", "react", "./utils", "./mixed", "./polyfill", "./types"]
        );
    }

    #[test]
    fn test_multiline_named_import() {
        let source = "import {\n  a,\n  b, // trailing\n  c,\n} from './abc';";
        let found = scan_imports(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].specifier, "./abc");
        assert_eq!(found[0].kind, ImportKind::Static);
    }

    #[test]
    fn test_dynamic_import() {
        let source = r#"const mod = await import("./lazy"); const x = import(name);"#;
        let found = scan_imports(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].specifier, "./lazy");
        assert_eq!(found[0].kind, ImportKind::Dynamic);
    }

    #[test]
    fn test_re_exports() {
        let source = r#"
export * from "./all";
export * as ns from "./ns";
export { a, b as c } from './named';
export type { T } from "./types";
export const value = 1;
export { value as renamed };
export default function main() {}
"#;
        let found = scan_imports(source);
        let names: Vec<&str> = found.iter().map(|s| s.specifier.as_str()).collect();
        assert_eq!(names, vec!["./all", "./ns", "./named", "./types"]);
        assert!(found.iter().all(|s| s.kind == ImportKind::ReExport));
    }

    #[test]
    fn test_ignores_comments_and_strings() {
        let source = r#"
// import a from "./commented"
/* import b from "./block"
   export * from "./block2" */
const s = "import c from './in-string'";
const t = `import d from "./in-template"`;
import real from "./real";
"#;
        assert_eq!(specifiers(source), vec!["./real"]);
    }

    #[test]
    fn test_ignores_import_meta_and_members() {
        let source = r#"
if (import.meta.hot) { import.meta.hot.accept(); }
loader.import("./not-an-import");
const imported = 1;
"#;
        assert!(scan_imports(source).is_empty());
    }

    #[test]
    fn test_spans_point_at_specifier_text() {
        let source = "const π = 1;\nimport App from \"./App\";\nexport * from './x';";
        for found in scan_imports(source) {
            assert_eq!(&source[found.start..found.end], found.specifier);
        }
        assert_eq!(scan_imports(source).len(), 2);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let source = "import a from './dep';\nimport b from './dep';";
        let found = scan_imports(source);
        assert_eq!(found.len(), 2);
        assert_ne!(found[0].start, found[1].start);
    }

    #[test]
    fn test_empty_and_plain_sources() {
        assert!(scan_imports("").is_empty());
        assert!(scan_imports("console.log('hello');").is_empty());
        assert!(scan_imports("import").is_empty());
    }
}
