//! Line parser for the engine's statement language.

/// Deepest allowed chain of parentheses and unary minus.
pub const MAX_NESTING: usize = 256;
/// Operator nodes allowed in one statement. Bounds the tree height that
/// evaluation recurses over.
pub const MAX_EXPR_NODES: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Int(i64),
    Str(String),
    Ident(String),
    Op(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Str(String),
    Name(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Assign(String, Expr),
    Print(Expr),
    Import(String),
    Raise(Expr),
    Fail(Expr),
    Skip,
    Expr(Expr),
}

/// Parse one source line. Blank lines and comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Stmt>, String> {
    let tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        nodes: 0,
    };
    let stmt = parser.statement()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("unexpected {}", describe(tok)));
    }
    Ok(Some(stmt))
}

fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '#' => break,
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(d);
                    chars.next();
                }
                let n = digits
                    .parse()
                    .map_err(|_| format!("integer literal {digits} out of range"))?;
                tokens.push(Token::Int(n));
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        None => return Err("unterminated string literal".to_string()),
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(e @ ('"' | '\\')) => s.push(e),
                            Some(e) => return Err(format!("unknown escape \\{e}")),
                            None => return Err("unterminated string literal".to_string()),
                        },
                        Some(other) => s.push(other),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_alphanumeric() || **d == '_') {
                    ident.push(d);
                    chars.next();
                }
                tokens.push(Token::Ident(ident));
            }
            '+' | '-' | '*' | '/' | '(' | ')' | '=' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    nodes: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    /// Run `inner` one nesting level deeper.
    fn nested<T>(&mut self, inner: impl FnOnce(&mut Self) -> Result<T, String>) -> Result<T, String> {
        if self.depth >= MAX_NESTING {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        let result = inner(self);
        self.depth -= 1;
        result
    }

    fn grow(&mut self) -> Result<(), String> {
        self.nodes += 1;
        if self.nodes > MAX_EXPR_NODES {
            return Err("expression too large".to_string());
        }
        Ok(())
    }

    fn eat_op(&mut self, op: char) -> bool {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn statement(&mut self) -> Result<Stmt, String> {
        if let Some(Token::Ident(word)) = self.peek().cloned() {
            let assigns = self.tokens.get(self.pos + 1) == Some(&Token::Op('='));
            match word.as_str() {
                _ if assigns => {
                    self.pos += 2;
                    return Ok(Stmt::Assign(word, self.expr()?));
                }
                "print" => {
                    self.pos += 1;
                    return Ok(Stmt::Print(self.expr()?));
                }
                "raise" => {
                    self.pos += 1;
                    return Ok(Stmt::Raise(self.expr()?));
                }
                "fail" => {
                    self.pos += 1;
                    return Ok(Stmt::Fail(self.expr()?));
                }
                "skip" if self.tokens.len() == 1 => {
                    self.pos += 1;
                    return Ok(Stmt::Skip);
                }
                "import" => {
                    self.pos += 1;
                    return match self.next() {
                        Some(Token::Str(path)) => Ok(Stmt::Import(path)),
                        _ => Err("import expects a string path".to_string()),
                    };
                }
                _ => {}
            }
        }
        Ok(Stmt::Expr(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat_op('+') {
                BinOp::Add
            } else if self.eat_op('-') {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            self.grow()?;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat_op('*') {
                BinOp::Mul
            } else if self.eat_op('/') {
                BinOp::Div
            } else {
                return Ok(lhs);
            };
            self.grow()?;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat_op('-') {
            self.grow()?;
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Expr::Int(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(name)) => Ok(Expr::Name(name)),
            Some(Token::Op('(')) => {
                let inner = self.nested(Self::expr)?;
                if !self.eat_op(')') {
                    return Err("expected ')'".to_string());
                }
                Ok(inner)
            }
            Some(tok) => Err(format!("unexpected {}", describe(&tok))),
            None => Err("unexpected end of line".to_string()),
        }
    }
}

fn describe(tok: &Token) -> String {
    match tok {
        Token::Int(n) => format!("number {n}"),
        Token::Str(_) => "string literal".to_string(),
        Token::Ident(name) => format!("name '{name}'"),
        Token::Op(c) => format!("'{c}'"),
    }
}
