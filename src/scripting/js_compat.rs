/// Rewrite the JavaScript subset emitted by the block compiler into Rhai.
/// Returns `None` when the source does not look like block-generated JS.
pub(crate) fn transpile_block_js_to_rhai(source: &str) -> Option<String> {
    let looks_like_js = source.contains('\'')
        || source.contains("var ")
        || source.contains("===")
        || source.contains("!==")
        || source.contains("function ")
        || source.contains("++")
        || source.contains("--");
    if !looks_like_js {
        return None;
    }

    let mut out = String::with_capacity(source.len() + 16);
    let mut converted_any = false;

    for raw in source.lines() {
        let indent = raw
            .chars()
            .take_while(|c| c.is_ascii_whitespace())
            .collect::<String>();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            out.push('\n');
            continue;
        }

        let line = convert_single_quoted_strings(trimmed);

        if let Some(header) = parse_counted_for(&line) {
            out.push_str(&indent);
            out.push_str(&header);
            out.push('\n');
            converted_any = true;
            continue;
        }

        let converted = map_code_segments(&line, convert_js_code);
        if converted != trimmed {
            converted_any = true;
        }
        out.push_str(&indent);
        out.push_str(&converted);
        out.push('\n');
    }

    if converted_any {
        Some(out)
    } else {
        None
    }
}

fn convert_js_code(code: &str) -> String {
    let mut out = code.replace("!==", "!=").replace("===", "==");
    out = replace_word_token(&out, "var", "let");
    out = replace_word_token(&out, "function", "fn");
    out = replace_word_token(&out, "null", "()");
    convert_increment_statement(&out)
}

/// `count++;` / `count--;` as whole statements.
fn convert_increment_statement(code: &str) -> String {
    let trimmed = code.trim_end();
    let (body, semicolon) = match trimmed.strip_suffix(';') {
        Some(body) => (body.trim_end(), ";"),
        None => (trimmed, ""),
    };
    for (suffix, op) in [("++", "+="), ("--", "-=")] {
        if let Some(name) = body.strip_suffix(suffix) {
            let name = name.trim();
            if !name.is_empty() && name.chars().all(is_word_char) {
                return format!("{name} {op} 1{semicolon}");
            }
        }
    }
    code.to_string()
}

/// `for (var i = A; i < B; i++) {` becomes `for i in A..B {`.
fn parse_counted_for(line: &str) -> Option<String> {
    let rest = line.strip_prefix("for (")?.strip_suffix('{')?.trim_end();
    let rest = rest.strip_suffix(')')?;
    let mut parts = rest.split(';').map(str::trim);
    let init = parts.next()?;
    let cond = parts.next()?;
    let step = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let init = init
        .strip_prefix("var ")
        .or_else(|| init.strip_prefix("let "))
        .unwrap_or(init);
    let (name, start) = init.split_once('=')?;
    let name = name.trim();
    let start = start.trim();
    if name.is_empty() || start.is_empty() || !name.chars().all(is_word_char) {
        return None;
    }

    let (range_op, end) = if let Some((lhs, rhs)) = cond.split_once("<=") {
        (lhs.trim() == name).then_some(("..=", rhs.trim()))?
    } else {
        let (lhs, rhs) = cond.split_once('<')?;
        (lhs.trim() == name).then_some(("..", rhs.trim()))?
    };
    if end.is_empty() {
        return None;
    }

    let step_ok = step == format!("{name}++")
        || step == format!("++{name}")
        || step.replace(' ', "") == format!("{name}+=1");
    if !step_ok {
        return None;
    }

    Some(format!("for {name} in {start}{range_op}{end} {{"))
}

/// Turn `'text'` literals into `"text"`; Rhai reserves single quotes for chars.
fn convert_single_quoted_strings(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len() + 2);
    let mut i = 0usize;
    while i < chars.len() {
        match chars[i] {
            '"' => {
                let end = find_closing_quote(&chars, i, '"');
                out.extend(&chars[i..end]);
                i = end;
            }
            '\'' => {
                let end = find_closing_quote(&chars, i, '\'');
                out.push('"');
                let mut j = i + 1;
                let closed = end > i + 1 && chars.get(end - 1) == Some(&'\'');
                let body_end = if closed { end - 1 } else { end };
                while j < body_end {
                    match chars[j] {
                        '\\' if j + 1 < body_end && chars[j + 1] == '\'' => {
                            out.push('\'');
                            j += 2;
                            continue;
                        }
                        '\\' if j + 1 < body_end => {
                            out.push('\\');
                            out.push(chars[j + 1]);
                            j += 2;
                            continue;
                        }
                        '"' => out.push_str("\\\""),
                        c => out.push(c),
                    }
                    j += 1;
                }
                out.push('"');
                i = end;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Index just past the literal opened at `start`, honouring backslash escapes.
fn find_closing_quote(chars: &[char], start: usize, quote: char) -> usize {
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

/// Apply `f` to the parts of `line` outside double-quoted literals.
fn map_code_segments(line: &str, f: impl Fn(&str) -> String) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut code = String::new();
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i] == '"' {
            out.push_str(&f(&code));
            code.clear();
            let end = find_closing_quote(&chars, i, '"').min(chars.len());
            out.extend(&chars[i..end]);
            i = end;
            continue;
        }
        code.push(chars[i]);
        i += 1;
    }
    out.push_str(&f(&code));
    out
}

fn replace_word_token(input: &str, token: &str, replacement: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let token_chars: Vec<char> = token.chars().collect();
    if token_chars.is_empty() {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len() + 8);
    let mut i = 0usize;
    while i < chars.len() {
        if i + token_chars.len() <= chars.len()
            && chars[i..(i + token_chars.len())] == token_chars[..]
        {
            let prev_ok = i == 0 || !is_word_char(chars[i - 1]);
            let next_ok =
                i + token_chars.len() == chars.len() || !is_word_char(chars[i + token_chars.len()]);
            if prev_ok && next_ok {
                out.push_str(replacement);
                i += token_chars.len();
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpiles_block_generated_program() {
        let source = r#"
moveEast('k9#');
while (notDone()) {
  if (isPathNorth('q')) {
    moveNorth('m');
  } else {
    moveEast('e');
  }
}
"#;
        let out = transpile_block_js_to_rhai(source).expect("should transpile");
        assert!(out.contains(r#"moveEast("k9#");"#));
        assert!(out.contains("while (notDone()) {"));
        assert!(out.contains(r#"if (isPathNorth("q")) {"#));
        assert!(out.contains(r#"    moveNorth("m");"#));
    }

    #[test]
    fn skips_native_rhai_source() {
        assert!(transpile_block_js_to_rhai(r#"moveEast("a"); moveSouth();"#).is_none());
    }

    #[test]
    fn rewrites_counted_repeat_loops() {
        let out = transpile_block_js_to_rhai(
            "for (var count = 0; count < 4; count++) {\n  moveEast('x');\n}\n",
        )
        .expect("should transpile");
        assert!(out.starts_with("for count in 0..4 {"));
        assert!(out.contains("}"));

        assert_eq!(
            parse_counted_for("for (let i = 1; i <= n; i += 1) {").as_deref(),
            Some("for i in 1..=n {")
        );
        assert!(parse_counted_for("for (var i = 0; j < 3; i++) {").is_none());
    }

    #[test]
    fn converts_declarations_equality_and_increments() {
        let source = "var n = 0;\nif (n === 0 && n !== 1) {\n  n++;\n}\nfunction go(d) {\n  d--;\n}\n";
        let out = transpile_block_js_to_rhai(source).expect("should transpile");
        assert!(out.contains("let n = 0;"));
        assert!(out.contains("if (n == 0 && n != 1) {"));
        assert!(out.contains("  n += 1;"));
        assert!(out.contains("fn go(d) {"));
        assert!(out.contains("  d -= 1;"));
    }

    #[test]
    fn string_contents_are_left_alone() {
        let out = transpile_block_js_to_rhai("moveEast('var x === y');\n").unwrap();
        assert!(out.contains(r#"moveEast("var x === y");"#));

        let out = convert_single_quoted_strings(r#"say('it\'s "here"')"#);
        assert_eq!(out, r#"say("it's \"here\"")"#);
    }
}
