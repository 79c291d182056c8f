//! Source scanner
//!
//! Turns source text into a managed block of cells: numbers, strings,
//! chars, binaries, the word family (`word`, `word:`, `:word`, `'word`,
//! `/refinement`), paths in each flavor, blocks, groups, and blank (`_`).
//! Comments run `;` to end of line. Newlines are recorded on the following
//! cell for mold fidelity. Errors are syntax-class failures naming the
//! offending token and its line.

use revel_core::{Cell, CellFlags, ListKind, NodeFlags, NodeId, Payload, WordKind};

use crate::engine::Engine;
use crate::error::{ErrorId, Raised};

const WORD_CHARS: &str = "+-*/=<>?!.&|~^_'";

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || WORD_CHARS.contains(c)
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '[' | ']' | '(' | ')' | '"' | ';')
}

impl Engine {
    /// Scan source text into a managed block.
    pub fn load_text(&mut self, text: &str) -> Result<NodeId, Raised> {
        let mut scanner = Scanner {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            newline_pending: false,
        };
        scanner.scan_body(self, None)
    }
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    newline_pending: bool,
}

impl Scanner {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.newline_pending = true;
        }
        Some(c)
    }

    fn fail_scan(&self, engine: &mut Engine, id: ErrorId, token: &str) -> Raised {
        let rendered = format!("{token} (line {})", self.line);
        let text = engine
            .heap
            .make_text(&rendered)
            .ok()
            .map(|node| {
                engine.heap.manage(node);
                Cell::text(node, 0)
            })
            .unwrap_or_else(Cell::blank);
        engine.fail(id, &[text])
    }

    fn skip_blanks(&mut self) {
        loop {
            match self.peek() {
                Some(';') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                _ => return,
            }
        }
    }

    /// Scan until the closing delimiter (None = end of input), producing a
    /// managed array.
    fn scan_body(&mut self, engine: &mut Engine, closer: Option<char>) -> Result<NodeId, Raised> {
        let array = engine
            .heap
            .make_array(8, NodeFlags::empty())
            .map_err(|t| engine.fail_trouble(t))?;

        loop {
            self.skip_blanks();
            let Some(c) = self.peek() else {
                if let Some(expected) = closer {
                    return Err(self.fail_scan(engine, ErrorId::ScanMissing, &expected.to_string()));
                }
                break;
            };
            if Some(c) == closer {
                self.bump();
                break;
            }
            if c == ']' || c == ')' {
                return Err(self.fail_scan(engine, ErrorId::ScanInvalid, &c.to_string()));
            }

            let newline = std::mem::take(&mut self.newline_pending);
            let mut cell = self.scan_value(engine)?;
            if newline {
                cell.flags |= CellFlags::NEWLINE_BEFORE;
            }
            engine
                .heap
                .push_cell(array, cell)
                .map_err(|t| engine.fail_trouble(t))?;
        }

        engine.heap.manage(array);
        Ok(array)
    }

    fn scan_value(&mut self, engine: &mut Engine) -> Result<Cell, Raised> {
        let c = self.peek().expect("caller checked non-empty");
        match c {
            '[' => {
                self.bump();
                let node = self.scan_body(engine, Some(']'))?;
                Ok(Cell::list(ListKind::Block, node, 0))
            }
            '(' => {
                self.bump();
                let node = self.scan_body(engine, Some(')'))?;
                Ok(Cell::list(ListKind::Group, node, 0))
            }
            '"' => self.scan_string(engine),
            '#' => self.scan_hash(engine),
            '\'' => {
                self.bump();
                let token = self.take_token(engine)?;
                self.token_to_word(engine, &token, Prefix::Lit)
            }
            ':' => {
                self.bump();
                let token = self.take_token(engine)?;
                self.token_to_word(engine, &token, Prefix::Get)
            }
            '/' if self.peek_at(1).map(is_delimiter).unwrap_or(true) => {
                // A solitary slash is the division word.
                self.bump();
                let sym = engine.symbols.intern("/");
                Ok(Cell::word(WordKind::Word, sym))
            }
            '/' => {
                self.bump();
                let token = self.take_token(engine)?;
                let sym = engine.symbols.intern(&token);
                Ok(Cell::word(WordKind::Refinement, sym))
            }
            _ if c.is_ascii_digit() => self.scan_number(engine),
            '+' | '-' if self.peek_at(1).map(|n| n.is_ascii_digit()).unwrap_or(false) => {
                self.scan_number(engine)
            }
            _ if is_word_char(c) => {
                let token = self.take_token(engine)?;
                if token == "_" {
                    return Ok(Cell::blank());
                }
                if let Some(stripped) = token.strip_suffix(':') {
                    self.token_to_word(engine, stripped, Prefix::Set)
                } else {
                    self.token_to_word(engine, &token, Prefix::Plain)
                }
            }
            _ => Err(self.fail_scan(engine, ErrorId::ScanInvalid, &c.to_string())),
        }
    }

    /// Take one raw token: word characters plus path slashes, with an
    /// optional single trailing colon.
    fn take_token(&mut self, engine: &mut Engine) -> Result<String, Raised> {
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if is_word_char(c) || c == '/' {
                token.push(c);
                self.bump();
            } else if c == ':' {
                token.push(c);
                self.bump();
                break;
            } else if is_delimiter(c) {
                break;
            } else {
                return Err(self.fail_scan(engine, ErrorId::ScanInvalid, &c.to_string()));
            }
        }
        if token.is_empty() {
            return Err(self.fail_scan(engine, ErrorId::ScanInvalid, "empty token"));
        }
        Ok(token)
    }

    fn token_to_word(&mut self, engine: &mut Engine, token: &str, prefix: Prefix) -> Result<Cell, Raised> {
        if token.contains('/') && token.len() > 1 {
            return self.token_to_path(engine, token, prefix);
        }
        let sym = engine.symbols.intern(token);
        let kind = match prefix {
            Prefix::Plain => WordKind::Word,
            Prefix::Set => WordKind::SetWord,
            Prefix::Get => WordKind::GetWord,
            Prefix::Lit => WordKind::LitWord,
        };
        Ok(Cell::word(kind, sym))
    }

    fn token_to_path(&mut self, engine: &mut Engine, token: &str, prefix: Prefix) -> Result<Cell, Raised> {
        let (body, set) = match token.strip_suffix(':') {
            Some(stripped) => (stripped, true),
            None => (token, false),
        };
        let kind = match (prefix, set) {
            (Prefix::Plain, false) => ListKind::Path,
            (Prefix::Plain, true) | (Prefix::Set, _) => ListKind::SetPath,
            (Prefix::Get, _) => ListKind::GetPath,
            (Prefix::Lit, _) => ListKind::LitPath,
        };

        let segments: Vec<&str> = body.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(self.fail_scan(engine, ErrorId::ScanInvalid, token));
        }
        let node = engine
            .heap
            .make_array(segments.len(), NodeFlags::empty())
            .map_err(|t| engine.fail_trouble(t))?;
        for segment in segments {
            let cell = if segment.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
                || (segment.starts_with(['+', '-']) && segment.len() > 1)
            {
                match segment.parse::<i64>() {
                    Ok(n) => Cell::integer(n),
                    Err(_) => Cell::word(WordKind::Word, engine.symbols.intern(segment)),
                }
            } else {
                Cell::word(WordKind::Word, engine.symbols.intern(segment))
            };
            engine
                .heap
                .push_cell(node, cell)
                .map_err(|t| engine.fail_trouble(t))?;
        }
        engine.heap.manage(node);
        Ok(Cell::list(kind, node, 0))
    }

    fn scan_number(&mut self, engine: &mut Engine) -> Result<Cell, Raised> {
        let mut token = String::new();
        if matches!(self.peek(), Some('+') | Some('-')) {
            token.push(self.bump().expect("sign peeked"));
        }
        let mut is_decimal = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                token.push(c);
                self.bump();
            } else if c == '.' && !is_decimal {
                is_decimal = true;
                token.push(c);
                self.bump();
            } else if is_delimiter(c) || c == '/' || c == ':' {
                break;
            } else {
                return Err(self.fail_scan(engine, ErrorId::ScanInvalid, &c.to_string()));
            }
        }
        if is_decimal {
            match token.parse::<f64>() {
                Ok(f) => Ok(Cell::decimal(f)),
                Err(_) => Err(self.fail_scan(engine, ErrorId::ScanInvalid, &token)),
            }
        } else {
            match token.parse::<i64>() {
                Ok(n) => Ok(Cell::integer(n)),
                Err(_) => Err(self.fail_scan(engine, ErrorId::ScanInvalid, &token)),
            }
        }
    }

    fn scan_string(&mut self, engine: &mut Engine) -> Result<Cell, Raised> {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.fail_scan(engine, ErrorId::ScanMissing, "\"")),
                Some('"') => break,
                Some('^') => match self.bump() {
                    Some('/') => text.push('\n'),
                    Some('-') => text.push('\t'),
                    Some('^') => text.push('^'),
                    Some('"') => text.push('"'),
                    Some(other) => {
                        return Err(self.fail_scan(
                            engine,
                            ErrorId::ScanInvalid,
                            &format!("^{other}"),
                        ))
                    }
                    None => return Err(self.fail_scan(engine, ErrorId::ScanMissing, "\"")),
                },
                Some(c) => text.push(c),
            }
        }
        let node = engine
            .heap
            .make_text(&text)
            .map_err(|t| engine.fail_trouble(t))?;
        engine.heap.manage(node);
        Ok(Cell::text(node, 0))
    }

    fn scan_hash(&mut self, engine: &mut Engine) -> Result<Cell, Raised> {
        self.bump(); // '#'
        match self.peek() {
            Some('"') => {
                self.bump();
                let c = match self.bump() {
                    Some('^') => match self.bump() {
                        Some('/') => '\n',
                        Some('-') => '\t',
                        Some('^') => '^',
                        Some('"') => '"',
                        _ => return Err(self.fail_scan(engine, ErrorId::ScanInvalid, "char escape")),
                    },
                    Some(c) => c,
                    None => return Err(self.fail_scan(engine, ErrorId::ScanMissing, "\"")),
                };
                match self.bump() {
                    Some('"') => Ok(Cell::char(c)),
                    _ => Err(self.fail_scan(engine, ErrorId::ScanMissing, "\"")),
                }
            }
            Some('{') => {
                self.bump();
                let mut hex = String::new();
                loop {
                    match self.bump() {
                        None => return Err(self.fail_scan(engine, ErrorId::ScanMissing, "}")),
                        Some('}') => break,
                        Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                        Some(c) if c.is_whitespace() => continue,
                        Some(c) => {
                            return Err(self.fail_scan(engine, ErrorId::ScanInvalid, &c.to_string()))
                        }
                    }
                }
                if hex.len() % 2 != 0 {
                    return Err(self.fail_scan(engine, ErrorId::ScanInvalid, &hex));
                }
                let bytes: Vec<u8> = (0..hex.len())
                    .step_by(2)
                    .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("hex digits checked"))
                    .collect();
                let node = engine
                    .heap
                    .make_binary(&bytes)
                    .map_err(|t| engine.fail_trouble(t))?;
                engine.heap.manage(node);
                Ok(Cell::binary(node, 0))
            }
            _ => Err(self.fail_scan(engine, ErrorId::ScanInvalid, "#")),
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Prefix {
    Plain,
    Set,
    Get,
    Lit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use revel_core::Kind;

    fn load(engine: &mut Engine, text: &str) -> NodeId {
        engine.load_text(text).expect("scan failure")
    }

    fn kinds(engine: &Engine, node: NodeId) -> Vec<Kind> {
        let len = engine.heap.node(node).len();
        (0..len)
            .map(|i| engine.heap.node(node).at(i).kind().expect("live cell"))
            .collect()
    }

    #[test]
    fn scans_numbers_words_and_strings() {
        let mut engine = Engine::new();
        let block = load(&mut engine, r#"12 -3 4.5 hello "text" _"#);
        assert_eq!(
            kinds(&engine, block),
            vec![Kind::Integer, Kind::Integer, Kind::Decimal, Kind::Word, Kind::Text, Kind::Blank]
        );
        assert_eq!(engine.heap.node(block).at(1).as_integer(), Some(-3));
    }

    #[test]
    fn scans_word_family() {
        let mut engine = Engine::new();
        let block = load(&mut engine, "x: :y 'z /only");
        assert_eq!(
            kinds(&engine, block),
            vec![Kind::SetWord, Kind::GetWord, Kind::LitWord, Kind::Refinement]
        );
    }

    #[test]
    fn scans_nested_blocks_and_groups() {
        let mut engine = Engine::new();
        let block = load(&mut engine, "[1 [2]] (3)");
        assert_eq!(kinds(&engine, block), vec![Kind::Block, Kind::Group]);
        let inner = match engine.heap.node(block).at(0).payload {
            Payload::List { node, .. } => node,
            _ => unreachable!(),
        };
        assert_eq!(kinds(&engine, inner), vec![Kind::Integer, Kind::Block]);
    }

    #[test]
    fn scans_paths() {
        let mut engine = Engine::new();
        let block = load(&mut engine, "a/b a/2: :a/b 'a/b f/only/part");
        assert_eq!(
            kinds(&engine, block),
            vec![Kind::Path, Kind::SetPath, Kind::GetPath, Kind::LitPath, Kind::Path]
        );
        let path = match engine.heap.node(block).at(1).payload {
            Payload::List { node, .. } => node,
            _ => unreachable!(),
        };
        assert_eq!(kinds(&engine, path), vec![Kind::Word, Kind::Integer]);
    }

    #[test]
    fn solitary_slash_is_a_word() {
        let mut engine = Engine::new();
        let block = load(&mut engine, "1 / 2");
        assert_eq!(
            kinds(&engine, block),
            vec![Kind::Integer, Kind::Word, Kind::Integer]
        );
    }

    #[test]
    fn comments_and_newlines() {
        let mut engine = Engine::new();
        let block = load(&mut engine, "1 ; ignored\n2");
        assert_eq!(kinds(&engine, block), vec![Kind::Integer, Kind::Integer]);
        assert!(
            engine
                .heap
                .node(block)
                .at(1)
                .flags
                .contains(CellFlags::NEWLINE_BEFORE),
            "newline recorded on the following cell"
        );
    }

    #[test]
    fn char_and_binary_literals() {
        let mut engine = Engine::new();
        let block = load(&mut engine, r##"#"a" #{00FF}"##);
        assert_eq!(kinds(&engine, block), vec![Kind::Char, Kind::Binary]);
        match engine.heap.node(block).at(1).payload {
            Payload::Binary { node, .. } => {
                assert_eq!(engine.heap.node(node).bytes(), &[0x00, 0xFF]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn unclosed_constructs_fail_with_syntax_errors() {
        let mut engine = Engine::new();
        for bad in ["[1 2", r#""open"#, "(1"] {
            let err = engine.load_text(bad).unwrap_err();
            match err {
                Raised::Error(cell) => {
                    assert_eq!(engine.error_id(&cell), Some("scan-missing"), "input: {bad}");
                }
                other => panic!("unexpected non-error unwind: {other:?}"),
            }
        }
    }
}
