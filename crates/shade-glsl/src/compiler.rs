use shade_core::{CompilerConfig, ShadeError, ShadeResult, StatementLowering};
use shade_lang::ast::*;

use crate::builder::ShaderCodeBuilder;

/// Version stamped into the header of every kernel.
pub const BACKEND_VERSION: &str = env!("CARGO_PKG_VERSION");

/// GLSL source for a single shader stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    pub stage: ShaderKind,
    pub source: String,
}

/// Lowers a merged [`ShaderDeclaration`] into one GLSL kernel per stage.
#[derive(Debug, Clone)]
pub struct GlslCompiler {
    version: String,
    statement_lowering: StatementLowering,
}

impl Default for GlslCompiler {
    fn default() -> Self {
        Self::from_config(&CompilerConfig::default())
    }
}

impl GlslCompiler {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            statement_lowering: StatementLowering::default(),
        }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            version: config.glsl_version.clone(),
            statement_lowering: config.statement_lowering,
        }
    }

    pub fn with_statement_lowering(mut self, statement_lowering: StatementLowering) -> Self {
        self.statement_lowering = statement_lowering;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn compile(&self, declaration: &ShaderDeclaration) -> ShadeResult<Vec<Kernel>> {
        let unit = &declaration.compilation_unit;
        tracing::debug!(
            path = %declaration.path,
            stages = unit.stages.len(),
            "compiling shader to GLSL"
        );

        unit.stages
            .iter()
            .map(|stage| self.compile_stage(declaration, stage))
            .collect()
    }

    fn compile_stage(
        &self,
        declaration: &ShaderDeclaration,
        stage: &StageDeclaration,
    ) -> ShadeResult<Kernel> {
        let unit = &declaration.compilation_unit;
        let mut builder = ShaderCodeBuilder::new();

        builder.append_comment(&format!("{} compiled from {}", stage.kind, declaration.path));
        builder.append_comment(&format!("Compiled using shade-glsl v{}", BACKEND_VERSION));
        builder.append_blank_line();
        builder.append_line(&format!("#version {}", self.version));
        builder.append_blank_line();

        for uniform in &unit.uniforms {
            let primitive = &uniform.primitive;
            builder.append_declaration(
                "uniform",
                precision_qualifier(primitive),
                &to_glsl(primitive)?,
                &uniform.name,
            );
        }
        builder.append_blank_line();

        for varying in &unit.varyings {
            let primitive = &varying.primitive;
            builder.append_declaration(
                "varying",
                precision_qualifier(primitive),
                &to_glsl(primitive)?,
                &varying.name,
            );
        }
        builder.append_blank_line();

        for constant in &unit.constants {
            self.lower_constant(&mut builder, constant)?;
        }
        builder.append_blank_line();

        if self.statement_lowering == StatementLowering::Full {
            for function in &unit.functions {
                self.lower_function(&mut builder, function)?;
                builder.append_blank_line();
            }
        }

        builder.begin_block("void main()");
        for statement in &stage.statements {
            self.lower_statement(&mut builder, statement)?;
        }
        builder.end_block();

        Ok(Kernel {
            stage: stage.kind,
            source: builder.finish(),
        })
    }

    fn lower_constant(
        &self,
        builder: &mut ShaderCodeBuilder,
        constant: &ConstantDeclaration,
    ) -> ShadeResult<()> {
        let primitive = &constant.primitive;
        builder.append_constant(
            precision_qualifier(primitive),
            &to_glsl(primitive)?,
            &constant.name,
            &lower_expression(&constant.value)?,
        );
        Ok(())
    }

    fn lower_function(
        &self,
        builder: &mut ShaderCodeBuilder,
        function: &FunctionDeclaration,
    ) -> ShadeResult<()> {
        let parameters = function
            .parameters
            .iter()
            .map(lower_parameter)
            .collect::<ShadeResult<Vec<_>>>()?;

        let return_type = qualified_type(&function.return_type)?;
        let signature = format!("{} {}({})", return_type, function.name, parameters.join(", "));
        builder.begin_block(&signature);
        for statement in &function.statements {
            self.lower_statement(builder, statement)?;
        }
        builder.end_block();

        Ok(())
    }

    fn lower_statement(
        &self,
        builder: &mut ShaderCodeBuilder,
        statement: &Statement,
    ) -> ShadeResult<()> {
        if let Statement::Comment(text) = statement {
            builder.append_comment(text);
            return Ok(());
        }

        if self.statement_lowering == StatementLowering::Comments {
            tracing::trace!(?statement, "statement not lowered");
            return Ok(());
        }

        match statement {
            Statement::Comment(_) => {}
            Statement::Assignment { variable, value } => {
                builder.append_line(&format!("{} = {};", variable, lower_expression(value)?));
            }
            Statement::Return(value) => {
                builder.append_line(&format!("return {};", lower_expression(value)?));
            }
            Statement::Expression(value) => {
                builder.append_line(&format!("{};", lower_expression(value)?));
            }
            Statement::ConstantDeclaration(constant) => self.lower_constant(builder, constant)?,
            Statement::Include(_) | Statement::ShaderTypeDeclaration(_) => {
                tracing::trace!(?statement, "directive inside a body ignored");
            }
            Statement::ControlFlow(flow) => {
                let keyword = match flow {
                    ControlFlow::If { .. } => "if",
                    ControlFlow::While { .. } => "while",
                    ControlFlow::For { .. } => "for",
                };
                return Err(ShadeError::lowering(format!(
                    "'{}' statements cannot be lowered to GLSL yet",
                    keyword
                )));
            }
            Statement::UniformDeclaration(_)
            | Statement::VaryingDeclaration(_)
            | Statement::FunctionDeclaration(_)
            | Statement::StageDeclaration(_) => {
                return Err(ShadeError::lowering(format!(
                    "Declaration is only valid at the top level: {:?}",
                    statement
                )));
            }
        }

        Ok(())
    }
}

/// Maps a primitive onto its GLSL type name, without precision.
pub fn to_glsl(primitive: &Primitive) -> ShadeResult<String> {
    use PrimitiveKind::*;

    let name = match (primitive.kind, primitive.cardinality) {
        (Void, _) => "void".to_string(),
        (Bool, None | Some(1)) => "bool".to_string(),
        (Int, None | Some(1)) => "int".to_string(),
        (UInt, None | Some(1)) => "uint".to_string(),
        (Float, None | Some(1)) => "float".to_string(),
        (Bool, Some(n @ 2..=4)) => format!("bvec{}", n),
        (Int, Some(n @ 2..=4)) => format!("ivec{}", n),
        (UInt, Some(n @ 2..=4)) => format!("uvec{}", n),
        (Float, Some(n @ 2..=4)) => format!("vec{}", n),
        (Matrix, Some(n @ 2..=4)) => format!("mat{}", n),
        (Sampler, Some(n @ 1..=3)) => format!("sampler{}D", n),
        _ => {
            return Err(ShadeError::lowering(format!(
                "Unable to convert primitive {:?} with cardinality {:?} to GLSL",
                primitive.kind, primitive.cardinality
            )))
        }
    };

    Ok(name)
}

pub fn precision_qualifier(primitive: &Primitive) -> Option<&'static str> {
    primitive.precision.map(|precision| match precision {
        Precision::Low => "lowp",
        Precision::Medium => "mediump",
        Precision::High => "highp",
    })
}

fn qualified_type(primitive: &Primitive) -> ShadeResult<String> {
    let ty = to_glsl(primitive)?;
    Ok(match precision_qualifier(primitive) {
        Some(precision) => format!("{} {}", precision, ty),
        None => ty,
    })
}

fn lower_parameter(parameter: &Parameter) -> ShadeResult<String> {
    Ok(format!("{} {}", qualified_type(&parameter.primitive)?, parameter.name))
}

/// Lowers an expression to GLSL. Nested binary operations are parenthesized
/// so the tree's grouping survives.
pub fn lower_expression(expression: &Expression) -> ShadeResult<String> {
    match expression {
        Expression::Constant(literal) => Ok(literal.to_string()),
        Expression::Symbol(name) => Ok(name.clone()),
        Expression::Variadic(values) => {
            let values = values
                .iter()
                .map(lower_expression)
                .collect::<ShadeResult<Vec<_>>>()?;
            Ok(values.join(", "))
        }
        Expression::Parameter(parameter) => lower_parameter(parameter),
        Expression::TypeConstructor { primitive, value } => {
            Ok(format!("{}({})", to_glsl(primitive)?, lower_expression(value)?))
        }
        Expression::SampleOperation { sampler, value } => {
            Ok(format!("texture({}, {})", sampler, lower_expression(value)?))
        }
        Expression::BinaryOperation {
            operator,
            left,
            right,
        } => {
            let op = match operator {
                BinaryOperator::Add => "+",
                BinaryOperator::Subtract => "-",
                BinaryOperator::Multiply => "*",
                BinaryOperator::Divide => "/",
                BinaryOperator::Equal => "==",
                BinaryOperator::NotEqual => "!=",
                BinaryOperator::Less => "<",
                BinaryOperator::LessEqual => "<=",
                BinaryOperator::Greater => ">",
                BinaryOperator::GreaterEqual => ">=",
            };
            Ok(format!("{} {} {}", lower_operand(left)?, op, lower_operand(right)?))
        }
        Expression::UnaryOperation { operator, value } => {
            let op = match operator {
                UnaryOperator::Negate => "-",
                UnaryOperator::Not => "!",
            };
            Ok(format!("{}{}", op, lower_operand(value)?))
        }
    }
}

fn lower_operand(expression: &Expression) -> ShadeResult<String> {
    let lowered = lower_expression(expression)?;
    match expression {
        Expression::BinaryOperation { .. } => Ok(format!("({})", lowered)),
        _ => Ok(lowered),
    }
}
