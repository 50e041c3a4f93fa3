use super::{clean_doc, qualify, CommentExtractor, ExtractedComment, MemberKind};
use crate::error::Result;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static PACKAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*package\s+([\w.]+)\s*;").unwrap());

static TYPE_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(class|interface|enum|record)\s+([A-Za-z_]\w*)").unwrap());

/// A doc block followed by optional markers; the match ends where the
/// documented declaration starts.
static DOC_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"/\*\*(?P<doc>(?:[^*]|\*+[^*/])*)\*+/\s*",
        r#"(?:@[\w.]+(?:\s*\((?:[^()"]|"(?:[^"\\]|\\.)*"|\([^()]*\))*\))?\s*)*"#,
    ))
    .unwrap()
});

static LEADING_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([A-Za-z_$][\w$]*)").unwrap());

const TYPE_KEYWORDS: [&str; 4] = ["class", "interface", "enum", "record"];

/// Regex-based comment extractor.
///
/// Comments and string literals are masked before type declarations and
/// braces are located, so nested types resolve to `Outer.Inner`. A doc on a
/// field declaration applies to every declarator; inside an enum constant
/// list it applies to the constant that follows.
#[derive(Debug, Default)]
pub struct RegexExtractor;

impl RegexExtractor {
    pub fn new() -> Self {
        Self
    }
}

struct TypeSpan {
    name: String,
    is_enum: bool,
    open: usize,
    close: usize,
}

impl CommentExtractor for RegexExtractor {
    fn extract(&mut self, source: &str) -> Result<Vec<ExtractedComment>> {
        let masked = mask_comments_and_strings(source);
        let namespace = PACKAGE
            .captures(&masked)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let spans = type_spans(&masked);

        let mut comments = Vec::new();
        for caps in DOC_HEAD.captures_iter(source) {
            let (Some(whole), Some(doc)) = (caps.get(0), caps.name("doc")) else {
                continue;
            };
            let chain = enclosing_types(&spans, whole.start());
            let Some(innermost) = chain.last() else {
                continue;
            };
            let path = chain.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(".");
            let type_name = qualify(&namespace, &path);

            let declaration = masked.get(whole.end()..).unwrap_or("");
            let (kind, names) = if innermost.is_enum && in_constant_list(&masked, innermost, whole.start()) {
                let constant = LEADING_IDENT
                    .captures(declaration)
                    .map(|c| c[1].to_string());
                (MemberKind::Field, constant.into_iter().collect())
            } else {
                declared_members(declaration)
            };

            let text = clean_doc(doc.as_str());
            for name in names {
                comments.push(ExtractedComment {
                    type_name: type_name.clone(),
                    member: name,
                    kind,
                    text: text.clone(),
                });
            }
        }
        debug!("Regex extractor found {} documented members", comments.len());
        Ok(comments)
    }
}

/// Kind and names of the member declared at the start of `declaration`: the
/// method name before `(`, or every declarator of a field. Type declarations
/// and text that leaves the enclosing body yield no names.
fn declared_members(declaration: &str) -> (MemberKind, Vec<String>) {
    let bytes = declaration.as_bytes();
    let mut names = Vec::new();
    let mut last: Option<&str> = None;
    let mut depth = 0usize;
    let mut angle = 0usize;
    let mut initializer = false;
    let mut type_declaration = false;

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if is_ident_byte(b) && !b.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && is_ident_byte(bytes[i]) {
                i += 1;
            }
            if depth == 0 && angle == 0 && !initializer {
                let ident = &declaration[start..i];
                type_declaration |= TYPE_KEYWORDS.contains(&ident);
                last = Some(ident);
            }
            continue;
        }

        let top = depth == 0 && angle == 0;
        match b {
            b'(' if top && !initializer => {
                if type_declaration {
                    break;
                }
                return (MemberKind::Method, last.map(str::to_string).into_iter().collect());
            }
            b'{' if top && !initializer => break,
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            b'<' if i > 0 && is_ident_byte(bytes[i - 1]) => angle += 1,
            b'>' if angle > 0 && i > 0 && bytes[i - 1] != b'-' => angle -= 1,
            b'=' if top && !initializer => {
                names.extend(last.take().map(str::to_string));
                initializer = true;
            }
            b',' if top => {
                if !initializer {
                    names.extend(last.take().map(str::to_string));
                }
                initializer = false;
            }
            b';' if top => {
                if !initializer {
                    names.extend(last.take().map(str::to_string));
                }
                return (MemberKind::Field, names);
            }
            _ => {}
        }
        i += 1;
    }
    (MemberKind::Field, Vec::new())
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Whether `pos` lies in the constant list of an enum body, before its first
/// top-level `;`.
fn in_constant_list(masked: &str, span: &TypeSpan, pos: usize) -> bool {
    let mut depth = 0i32;
    for b in &masked.as_bytes()[span.open + 1..pos] {
        match *b {
            b'{' | b'(' => depth += 1,
            b'}' | b')' => depth -= 1,
            b';' if depth == 0 => return false,
            _ => {}
        }
    }
    true
}

/// Replaces comment and string literal contents with spaces, preserving
/// byte offsets and line breaks.
fn mask_comments_and_strings(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(u8),
    }

    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut state = State::Code;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match (b, next) {
                (b'/', Some(b'/')) => {
                    state = State::LineComment;
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                }
                (b'/', Some(b'*')) => {
                    state = State::BlockComment;
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                }
                (b'"', _) | (b'\'', _) => state = State::Str(b),
                _ => {}
            },
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                } else {
                    out[i] = b' ';
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                    state = State::Code;
                } else if b != b'\n' {
                    out[i] = b' ';
                }
            }
            State::Str(quote) => {
                if b == b'\\' {
                    out[i] = b' ';
                    if next.map_or(false, |n| n != b'\n') {
                        out[i + 1] = b' ';
                        i += 1;
                    }
                } else if b == quote || b == b'\n' {
                    state = State::Code;
                } else {
                    out[i] = b' ';
                }
            }
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn type_spans(masked: &str) -> Vec<TypeSpan> {
    let bytes = masked.as_bytes();
    let mut spans = Vec::new();
    for caps in TYPE_DECL.captures_iter(masked) {
        let (Some(whole), Some(keyword), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(open) = masked[whole.end()..].find('{').map(|o| o + whole.end()) else {
            continue;
        };
        let mut depth = 0usize;
        let mut close = bytes.len();
        for (offset, b) in bytes[open..].iter().enumerate() {
            match *b {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = open + offset;
                        break;
                    }
                }
                _ => {}
            }
        }
        spans.push(TypeSpan {
            name: name.as_str().to_string(),
            is_enum: keyword.as_str() == "enum",
            open,
            close,
        });
    }
    spans
}

/// Types whose body contains `pos`, outermost first.
fn enclosing_types(spans: &[TypeSpan], pos: usize) -> Vec<&TypeSpan> {
    let mut chain: Vec<&TypeSpan> = spans
        .iter()
        .filter(|s| s.open < pos && pos < s.close)
        .collect();
    chain.sort_by_key(|s| s.open);
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> Vec<ExtractedComment> {
        RegexExtractor::new().extract(source).unwrap()
    }

    #[test]
    fn test_literal_method_signature() {
        let comments = extract("class Api { /** Returns the user. */ method getUser() }");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].type_name, "Api");
        assert_eq!(comments[0].member, "getUser");
        assert_eq!(comments[0].kind, MemberKind::Method);
        assert_eq!(comments[0].text, "Returns the user.");
    }

    #[test]
    fn test_markers_between_doc_and_member() {
        let source = r#"
package com.acme;

/** Handles users. */
@RestController
public class UserController {
    /**
     * Lists users (paged).
     * @return users
     */
    @GetMapping(value = "/list", produces = {"application/json"})
    @ApiOperation(value = "List (all)")
    public List<User> list(@RequestParam int page) { return null; }

    /** Page size. */
    private int size = 20;
}
"#;
        let comments = extract(source);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].type_name, "com.acme.UserController");
        assert_eq!(comments[0].member, "list");
        assert_eq!(comments[0].text, "Lists users (paged).");
        assert_eq!(comments[1].member, "size");
        assert_eq!(comments[1].kind, MemberKind::Field);
    }

    #[test]
    fn test_nested_types() {
        let source = r#"
package com.acme;
public class Outer {
    // class Fake { }
    String s = "class Quoted {";
    public static class Inner {
        /** Inner value. */
        private String value;
    }
    /** Outer id. */
    private long id;
}
"#;
        let comments = extract(source);
        let found: Vec<(String, String)> = comments
            .into_iter()
            .map(|c| (c.type_name, c.member))
            .collect();
        assert_eq!(
            found,
            vec![
                ("com.acme.Outer.Inner".to_string(), "value".to_string()),
                ("com.acme.Outer".to_string(), "id".to_string()),
            ]
        );
    }

    #[test]
    fn test_methods_and_fields() {
        let source = r#"
package com.acme.web;

/** Users. */
public class UserController {
    /** Returns the user. */
    @GetMapping("/{id}")
    public User getUser(@PathVariable long id) { return null; }

    // not a doc comment
    public void plain() {}

    /** Page size. */
    private int size = 20, max = 100;
}
"#;
        let comments = extract(source);
        let found: Vec<(&str, &str, MemberKind, &str)> = comments
            .iter()
            .map(|c| (c.type_name.as_str(), c.member.as_str(), c.kind, c.text.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("com.acme.web.UserController", "getUser", MemberKind::Method, "Returns the user."),
                ("com.acme.web.UserController", "size", MemberKind::Field, "Page size."),
                ("com.acme.web.UserController", "max", MemberKind::Field, "Page size."),
            ]
        );
    }

    #[test]
    fn test_nested_and_enum_types() {
        let source = r#"
package com.acme;
public class Outer {
    public static class Inner {
        /** Inner value. */
        private String value;
    }
    public enum Status {
        /** Active account. */
        ACTIVE,
        BLOCKED;

        /** Display label. */
        public String label() { return name(); }
    }
}
"#;
        let comments = extract(source);
        let found: Vec<(&str, &str, MemberKind)> = comments
            .iter()
            .map(|c| (c.type_name.as_str(), c.member.as_str(), c.kind))
            .collect();
        assert_eq!(
            found,
            vec![
                ("com.acme.Outer.Inner", "value", MemberKind::Field),
                ("com.acme.Outer.Status", "ACTIVE", MemberKind::Field),
                ("com.acme.Outer.Status", "label", MemberKind::Method),
            ]
        );
    }

    #[test]
    fn test_enum_constants_with_arguments() {
        let source = r#"
enum Level {
    /** Lowest. */
    LOW("l") { int weight() { return 1; } },
    /** Highest. */
    @Deprecated HIGH("h");

    /** Short code. */
    private final String code;
}
"#;
        let comments = extract(source);
        let found: Vec<(&str, MemberKind, &str)> = comments
            .iter()
            .map(|c| (c.member.as_str(), c.kind, c.text.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("LOW", MemberKind::Field, "Lowest."),
                ("HIGH", MemberKind::Field, "Highest."),
                ("code", MemberKind::Field, "Short code."),
            ]
        );
    }

    #[test]
    fn test_generic_declarations() {
        let source = r#"
class Cache {
    /** Counters. */
    private Map<String, List<Integer>> counts = new HashMap<String, List<Integer>>(), totals;

    /** Looks a value up. */
    public <T> Optional<T> lookup(Class<T> type) { return Optional.empty(); }

    /** Not a member. */
    static class Entry {}
}
"#;
        let comments = extract(source);
        let found: Vec<(&str, MemberKind)> = comments
            .iter()
            .map(|c| (c.member.as_str(), c.kind))
            .collect();
        assert_eq!(
            found,
            vec![
                ("counts", MemberKind::Field),
                ("totals", MemberKind::Field),
                ("lookup", MemberKind::Method),
            ]
        );
    }

    #[test]
    fn test_doc_outside_any_type_is_ignored() {
        assert!(extract("/** Stray. */ int x;").is_empty());
    }
}
