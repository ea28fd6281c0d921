use indexmap::IndexSet;
use shade_core::{Position, ShadeError, ShadeResult};

use crate::ast::*;
use crate::lexer::{Keyword, Token, TokenKind};

/// Deepest expression nesting accepted before the parser gives up.
const MAX_EXPRESSION_DEPTH: usize = 64;

/// Recursive descent parser over a token stream, producing one
/// [`CompilationUnit`]. The first error aborts the whole parse.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    path: String,
    last: Position,
    depth: usize,
}

/// Typed accumulators filled while parsing top-level declarations.
#[derive(Default)]
struct UnitBuilder {
    shader_type: Option<ShaderTypeDeclaration>,
    includes: IndexSet<Include>,
    uniforms: Vec<UniformDeclaration>,
    varyings: Vec<VaryingDeclaration>,
    constants: Vec<ConstantDeclaration>,
    functions: Vec<FunctionDeclaration>,
    stages: Vec<StageDeclaration>,
}

impl UnitBuilder {
    fn finish(self) -> CompilationUnit {
        CompilationUnit {
            shader_type: self.shader_type.unwrap_or_default(),
            includes: self.includes,
            uniforms: self.uniforms,
            varyings: self.varyings,
            constants: self.constants,
            functions: self.functions,
            stages: self.stages,
        }
    }
}

impl Parser {
    pub fn new(tokens: Vec<Token>, path: impl Into<String>) -> Self {
        let last = tokens
            .first()
            .map(|token| token.span.position())
            .unwrap_or_else(|| Position::new(1, 1));

        Self {
            tokens,
            pos: 0,
            path: path.into(),
            last,
            depth: 0,
        }
    }

    pub fn parse(&mut self) -> ShadeResult<CompilationUnit> {
        let mut unit = UnitBuilder::default();

        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Keyword(_) => self.parse_keyword(&mut unit)?,
                TokenKind::Identifier(_) => match self.parse_function()? {
                    Statement::StageDeclaration(stage) => unit.stages.push(stage),
                    Statement::FunctionDeclaration(function) => unit.functions.push(function),
                    other => {
                        let message = format!("Unexpected top-level statement: {:?}", other);
                        return Err(self.error(message));
                    }
                },
                // stray separators and anything else at the top level
                _ => {
                    self.advance();
                }
            }
        }

        Ok(unit.finish())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    fn peek_nth_kind(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + n).map(|token| &token.kind)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        self.last = token.span.position();
        Some(token)
    }

    fn bump(&mut self) -> ShadeResult<Token> {
        self.advance()
            .ok_or_else(|| self.error("Unexpected end of input"))
    }

    fn error(&self, message: impl Into<String>) -> ShadeError {
        ShadeError::parse(message, &self.path, self.last)
    }

    fn expect(&mut self, kind: TokenKind) -> ShadeResult<Token> {
        match self.peek_kind() {
            Some(found) if *found == kind => self.bump(),
            Some(found) => {
                let message = format!("Expected '{}', found '{}'", kind, found);
                Err(self.error(message))
            }
            None => Err(self.error(format!("Expected '{}', found end of input", kind))),
        }
    }

    fn parse_keyword(&mut self, unit: &mut UnitBuilder) -> ShadeResult<()> {
        let token = self.bump()?;
        let TokenKind::Keyword(keyword) = token.kind else {
            return Err(self.error("Expected a keyword"));
        };

        match keyword {
            Keyword::Include => {
                let include = self.parse_include()?;
                unit.includes.insert(include);
            }
            Keyword::ShaderType => {
                let declaration = self.parse_shader_type_declaration()?;
                unit.shader_type.get_or_insert(declaration);
            }
            Keyword::Uniform => {
                let primitive = self.parse_primitive()?;
                let name = self.parse_identifier()?;
                unit.uniforms.push(UniformDeclaration { primitive, name });
            }
            Keyword::Varying => {
                let primitive = self.parse_primitive()?;
                let name = self.parse_identifier()?;
                unit.varyings.push(VaryingDeclaration { primitive, name });
            }
            Keyword::Const => {
                let declaration = self.parse_constant_declaration()?;
                unit.constants.push(declaration);
            }
            Keyword::Sample => {
                // a free-standing sample has nowhere to live in the unit
                self.parse_sample_operation()?;
            }
            other => {
                return Err(self.error(format!(
                    "An unrecognized keyword was encountered: {}",
                    other.as_str()
                )));
            }
        }

        Ok(())
    }

    fn parse_include(&mut self) -> ShadeResult<Include> {
        match self.advance().map(|token| token.kind) {
            Some(TokenKind::String(path)) => Ok(Include { path }),
            _ => Err(self.error("Expected a string path after #include")),
        }
    }

    fn parse_shader_type_declaration(&mut self) -> ShadeResult<ShaderTypeDeclaration> {
        let kind = self.parse_identifier()?;
        Ok(ShaderTypeDeclaration { kind })
    }

    fn parse_constant_declaration(&mut self) -> ShadeResult<ConstantDeclaration> {
        let primitive = self.parse_primitive()?;
        let name = self.parse_identifier()?;
        self.expect(TokenKind::Equal)?;
        let value = self.parse_expression()?;

        Ok(ConstantDeclaration {
            primitive,
            name,
            value,
        })
    }

    /// Parses a function; reserved stage names become [`StageDeclaration`]s.
    fn parse_function(&mut self) -> ShadeResult<Statement> {
        let return_type = self.parse_primitive()?;
        let name = self.parse_identifier()?;
        let parameters = self.parse_parameters()?;
        let statements = self.parse_statements()?;

        if let Some(kind) = ShaderKind::from_stage_name(&name) {
            if !return_type.is_void() {
                return Err(self.error(format!(
                    "The stage function {} should have a void return type",
                    name
                )));
            }

            return Ok(Statement::StageDeclaration(StageDeclaration {
                kind,
                parameters,
                statements,
            }));
        }

        Ok(Statement::FunctionDeclaration(FunctionDeclaration {
            return_type,
            name,
            parameters,
            statements,
        }))
    }

    fn parse_parameters(&mut self) -> ShadeResult<Vec<Parameter>> {
        let mut parameters = Vec::new();

        self.expect(TokenKind::LeftParen)?;
        while !self.check(&TokenKind::RightParen) {
            let primitive = self.parse_primitive()?;
            let name = self.parse_identifier()?;
            parameters.push(Parameter { primitive, name });

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;

        Ok(parameters)
    }

    fn parse_statements(&mut self) -> ShadeResult<Vec<Statement>> {
        let mut statements = Vec::new();

        self.expect(TokenKind::LeftBrace)?;
        while !self.check(&TokenKind::RightBrace) {
            if self.peek().is_none() {
                return Err(self.error("Expected '}', found end of input"));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RightBrace)?;

        Ok(statements)
    }

    fn parse_statement(&mut self) -> ShadeResult<Statement> {
        match self.peek_kind() {
            Some(TokenKind::Comment(text)) => {
                let text = text.clone();
                self.advance();
                Ok(Statement::Comment(text))
            }
            Some(TokenKind::Keyword(keyword)) => {
                let keyword = *keyword;
                self.advance();
                match keyword {
                    Keyword::Return => {
                        let value = self.parse_expression()?;
                        self.expect(TokenKind::SemiColon)?;
                        Ok(Statement::Return(value))
                    }
                    Keyword::Const => {
                        let declaration = self.parse_constant_declaration()?;
                        self.expect(TokenKind::SemiColon)?;
                        Ok(Statement::ConstantDeclaration(declaration))
                    }
                    Keyword::If | Keyword::While | Keyword::For => Err(self.error(format!(
                        "'{}' statements are not supported yet",
                        keyword.as_str()
                    ))),
                    other => Err(self.error(format!(
                        "An unrecognized keyword was encountered: {}",
                        other.as_str()
                    ))),
                }
            }
            Some(TokenKind::Identifier(name))
                if self.peek_nth_kind(1) == Some(&TokenKind::Equal) =>
            {
                let variable = name.clone();
                self.advance();
                self.advance();
                let value = self.parse_expression()?;
                self.expect(TokenKind::SemiColon)?;
                Ok(Statement::Assignment { variable, value })
            }
            _ => {
                let expression = self.parse_expression()?;
                if !self.check(&TokenKind::SemiColon) {
                    return Err(self.error("Expect a semicolon after an expression"));
                }
                self.advance();
                Ok(Statement::Expression(expression))
            }
        }
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ShadeResult<T>) -> ShadeResult<T> {
        if self.depth >= MAX_EXPRESSION_DEPTH {
            return Err(self.error("Exceeded max expression depth"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    pub(crate) fn parse_expression(&mut self) -> ShadeResult<Expression> {
        self.nested(Self::parse_equality)
    }

    fn parse_equality(&mut self) -> ShadeResult<Expression> {
        let mut left = self.parse_comparison()?;

        loop {
            let operator = match self.peek_kind() {
                Some(TokenKind::EqualEqual) => BinaryOperator::Equal,
                Some(TokenKind::BangEqual) => BinaryOperator::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> ShadeResult<Expression> {
        let mut left = self.parse_additive()?;

        loop {
            let operator = match self.peek_kind() {
                Some(TokenKind::Less) => BinaryOperator::Less,
                Some(TokenKind::LessEqual) => BinaryOperator::LessEqual,
                Some(TokenKind::Greater) => BinaryOperator::Greater,
                Some(TokenKind::GreaterEqual) => BinaryOperator::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ShadeResult<Expression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let operator = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOperator::Add,
                Some(TokenKind::Minus) => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ShadeResult<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let operator = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOperator::Multiply,
                Some(TokenKind::Slash) => BinaryOperator::Divide,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ShadeResult<Expression> {
        let operator = match self.peek_kind() {
            Some(TokenKind::Minus) => UnaryOperator::Negate,
            Some(TokenKind::Bang) => UnaryOperator::Not,
            _ => return self.parse_primary(),
        };
        self.advance();

        let value = self.nested(Self::parse_unary)?;
        Ok(Expression::UnaryOperation {
            operator,
            value: Box::new(value),
        })
    }

    fn parse_primary(&mut self) -> ShadeResult<Expression> {
        let Some(token) = self.peek() else {
            return Err(self.error("Expected an expression, found end of input"));
        };

        match &token.kind {
            TokenKind::Identifier(name) if Primitive::is_type_literal(name) => {
                let primitive = self.parse_primitive()?;
                let value = self.parse_arguments()?;
                Ok(Expression::TypeConstructor {
                    primitive,
                    value: Box::new(value),
                })
            }
            TokenKind::Keyword(Keyword::Sample) => {
                self.advance();
                self.parse_sample_operation()
            }
            TokenKind::LeftParen => {
                self.advance();
                let expression = self.parse_expression()?;
                self.expect(TokenKind::RightParen)?;
                Ok(expression)
            }
            _ => {
                let token = self.bump()?;
                let fractional = token.lexeme.contains('.');
                match token.kind {
                    TokenKind::Number(value) => {
                        Ok(Expression::Constant(Literal::Number { value, fractional }))
                    }
                    TokenKind::String(value) => Ok(Expression::Constant(Literal::String(value))),
                    TokenKind::Identifier(name) => Ok(Expression::Symbol(name)),
                    other => Err(self.error(format!("Expected an expression, found '{}'", other))),
                }
            }
        }
    }

    /// `(a, b, c)` as a single expression, or [`Expression::Variadic`] when
    /// there is not exactly one argument.
    fn parse_arguments(&mut self) -> ShadeResult<Expression> {
        let mut arguments = Vec::new();

        self.expect(TokenKind::LeftParen)?;
        while !self.check(&TokenKind::RightParen) {
            arguments.push(self.parse_expression()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;

        if arguments.len() == 1 {
            Ok(arguments.remove(0))
        } else {
            Ok(Expression::Variadic(arguments))
        }
    }

    /// `SAMPLE(name, expression)`, with the keyword already consumed.
    fn parse_sample_operation(&mut self) -> ShadeResult<Expression> {
        self.expect(TokenKind::LeftParen)?;
        let sampler = self.parse_identifier()?;
        self.expect(TokenKind::Comma)?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;

        Ok(Expression::SampleOperation {
            sampler,
            value: Box::new(value),
        })
    }

    fn parse_primitive(&mut self) -> ShadeResult<Primitive> {
        let mut literal = self.parse_identifier()?;
        let precision = Precision::from_literal(&literal);

        if precision.is_some() {
            literal = self.parse_identifier()?;
        }

        Primitive::from_literal(&literal, precision).ok_or_else(|| {
            self.error(format!(
                "An unrecognized primitive type was specified {}",
                literal
            ))
        })
    }

    fn parse_identifier(&mut self) -> ShadeResult<String> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            Some(found) => {
                let message = format!("Expected an identifier, found '{}'", found);
                Err(self.error(message))
            }
            None => Err(self.error("Expected an identifier, found end of input")),
        }
    }
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::BinaryOperation {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }
}
