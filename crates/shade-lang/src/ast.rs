//! Syntax tree for the shading language.
//!
//! Every node is plain data. Statement and expression families are closed
//! enums so that consumers (the GLSL backend in particular) match over them
//! exhaustively.

use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;

/// Different types of precisions to use for primitive declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Precision {
    Low,
    Medium,
    High,
}

impl Precision {
    pub fn from_literal(literal: &str) -> Option<Self> {
        match literal {
            "lowp" => Some(Precision::Low),
            "medp" | "mediump" => Some(Precision::Medium),
            "highp" => Some(Precision::High),
            _ => None,
        }
    }
}

/// Base kinds of [`Primitive`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PrimitiveKind {
    Void,
    Bool,
    Int,
    UInt,
    Float,
    Matrix,
    Sampler,
}

/// A primitive type with optional cardinality for vector, matrix and sampler
/// representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    pub cardinality: Option<u8>,
    pub precision: Option<Precision>,
}

impl Primitive {
    pub const fn new(kind: PrimitiveKind) -> Self {
        Self {
            kind,
            cardinality: None,
            precision: None,
        }
    }

    pub const fn vector(kind: PrimitiveKind, cardinality: u8) -> Self {
        Self {
            kind,
            cardinality: Some(cardinality),
            precision: None,
        }
    }

    pub fn with_precision(mut self, precision: Option<Precision>) -> Self {
        self.precision = precision;
        self
    }

    /// Maps a type keyword such as `vec3`, `int2` or `sampler2d` to its primitive.
    ///
    /// Samplers never carry a precision.
    pub fn from_literal(literal: &str, precision: Option<Precision>) -> Option<Self> {
        use PrimitiveKind::*;

        let primitive = match literal {
            "void" => Primitive::new(Void),
            "bool" => Primitive::new(Bool),
            "bool2" => Primitive::vector(Bool, 2),
            "bool3" => Primitive::vector(Bool, 3),
            "bool4" => Primitive::vector(Bool, 4),
            "int" => Primitive::new(Int),
            "int2" => Primitive::vector(Int, 2),
            "int3" => Primitive::vector(Int, 3),
            "int4" => Primitive::vector(Int, 4),
            "uint" => Primitive::new(UInt),
            "uint2" => Primitive::vector(UInt, 2),
            "uint3" => Primitive::vector(UInt, 3),
            "uint4" => Primitive::vector(UInt, 4),
            "float" => Primitive::new(Float),
            "float2" | "vec2" => Primitive::vector(Float, 2),
            "float3" | "vec3" => Primitive::vector(Float, 3),
            "float4" | "vec4" => Primitive::vector(Float, 4),
            "mat2" => Primitive::vector(Matrix, 2),
            "mat3" => Primitive::vector(Matrix, 3),
            "mat4" => Primitive::vector(Matrix, 4),
            "sampler1d" => return Some(Primitive::vector(Sampler, 1)),
            "sampler2d" => return Some(Primitive::vector(Sampler, 2)),
            "sampler3d" => return Some(Primitive::vector(Sampler, 3)),
            _ => return None,
        };

        Some(primitive.with_precision(precision))
    }

    /// True if `literal` starts a primitive: a type keyword or a precision prefix.
    pub fn is_type_literal(literal: &str) -> bool {
        Precision::from_literal(literal).is_some()
            || Primitive::from_literal(literal, None).is_some()
    }

    pub fn is_void(&self) -> bool {
        self.kind == PrimitiveKind::Void
    }
}

/// The different stages a shader program can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ShaderKind {
    Vertex,
    Fragment,
    Geometry,
}

impl ShaderKind {
    /// Maps a reserved stage function name (`vertex`, `fragment`, `geometry`).
    pub fn from_stage_name(name: &str) -> Option<Self> {
        match name {
            "vertex" => Some(ShaderKind::Vertex),
            "fragment" => Some(ShaderKind::Fragment),
            "geometry" => Some(ShaderKind::Geometry),
            _ => None,
        }
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderKind::Vertex => write!(f, "Vertex"),
            ShaderKind::Fragment => write!(f, "Fragment"),
            ShaderKind::Geometry => write!(f, "Geometry"),
        }
    }
}

/// A literal constant value.
///
/// Numbers remember whether they were written with a decimal point, so
/// `2.0` stays a float literal when emitted instead of turning into `2`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Number { value: f64, fractional: bool },
    String(String),
}

impl Literal {
    /// A number that is fractional exactly when `value` has a fraction.
    pub fn number(value: f64) -> Self {
        Literal::Number {
            value,
            fractional: value.fract() != 0.0,
        }
    }

    /// A number written with a decimal point.
    pub fn float(value: f64) -> Self {
        Literal::Number {
            value,
            fractional: true,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number { value, fractional } if *fractional && value.fract() == 0.0 => {
                write!(f, "{:.1}", value)
            }
            Literal::Number { value, .. } => write!(f, "{}", value),
            Literal::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOperator {
    Negate,
    Not,
}

/// `int parameter1`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub primitive: Primitive,
    pub name: String,
}

/// A single expression, composite within a larger statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    /// `42`
    Constant(Literal),
    /// `test_variable`
    Symbol(String),
    /// `1, 2, 3`
    Variadic(Vec<Expression>),
    Parameter(Parameter),
    /// `vec3(1, 1, 1)`
    TypeConstructor {
        primitive: Primitive,
        value: Box<Expression>,
    },
    /// `SAMPLE(_Texture, uv)`
    SampleOperation {
        sampler: String,
        value: Box<Expression>,
    },
    BinaryOperation {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UnaryOperation {
        operator: UnaryOperator,
        value: Box<Expression>,
    },
}

/// `#include "local://shaders/common.shade"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Include {
    pub path: String,
}

/// `#shader_type sprite`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShaderTypeDeclaration {
    pub kind: String,
}

impl Default for ShaderTypeDeclaration {
    fn default() -> Self {
        Self {
            kind: "none".to_string(),
        }
    }
}

/// `uniform vec3 _direction;`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformDeclaration {
    pub primitive: Primitive,
    pub name: String,
}

/// `varying vec2 _uv;`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaryingDeclaration {
    pub primitive: Primitive,
    pub name: String,
}

/// `const float PI = 3.14159;`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstantDeclaration {
    pub primitive: Primitive,
    pub name: String,
    pub value: Expression,
}

/// `float circle(vec3 position, float radius) { ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub return_type: Primitive,
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub statements: Vec<Statement>,
}

/// `void fragment() { ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDeclaration {
    pub kind: ShaderKind,
    pub parameters: Vec<Parameter>,
    pub statements: Vec<Statement>,
}

/// Standard control flow variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ControlFlow {
    If {
        condition: Expression,
        true_branch: Vec<Statement>,
        false_branch: Vec<Statement>,
    },
    While {
        condition: Expression,
        statements: Vec<Statement>,
    },
    For {
        condition: Expression,
        statements: Vec<Statement>,
    },
}

/// A single statement in a shader program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    Comment(String),
    Include(Include),
    ShaderTypeDeclaration(ShaderTypeDeclaration),
    UniformDeclaration(UniformDeclaration),
    VaryingDeclaration(VaryingDeclaration),
    ConstantDeclaration(ConstantDeclaration),
    /// `test = vec3(1, 1, 1);`
    Assignment {
        variable: String,
        value: Expression,
    },
    Return(Expression),
    /// A statement that embodies a single expression.
    Expression(Expression),
    ControlFlow(ControlFlow),
    FunctionDeclaration(FunctionDeclaration),
    StageDeclaration(StageDeclaration),
}

/// The parsed contents of one shader file, possibly with included files
/// merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CompilationUnit {
    pub shader_type: ShaderTypeDeclaration,
    pub includes: IndexSet<Include>,
    pub uniforms: Vec<UniformDeclaration>,
    pub varyings: Vec<VaryingDeclaration>,
    pub constants: Vec<ConstantDeclaration>,
    pub functions: Vec<FunctionDeclaration>,
    pub stages: Vec<StageDeclaration>,
}

impl CompilationUnit {
    /// Unions `other` into this unit: includes as a set, every declaration
    /// list appended in order. Nothing is ever removed or deduplicated by name.
    pub fn merge_with(mut self, other: &CompilationUnit) -> Self {
        self.includes.extend(other.includes.iter().cloned());
        self.uniforms.extend(other.uniforms.iter().cloned());
        self.varyings.extend(other.varyings.iter().cloned());
        self.constants.extend(other.constants.iter().cloned());
        self.functions.extend(other.functions.iter().cloned());
        self.stages.extend(other.stages.iter().cloned());
        self
    }

    pub fn with_shader_type(mut self, kind: impl Into<String>) -> Self {
        self.shader_type = ShaderTypeDeclaration { kind: kind.into() };
        self
    }

    pub fn with_include(mut self, path: impl Into<String>) -> Self {
        self.includes.insert(Include { path: path.into() });
        self
    }

    pub fn with_uniform(mut self, primitive: Primitive, name: impl Into<String>) -> Self {
        self.uniforms.push(UniformDeclaration {
            primitive,
            name: name.into(),
        });
        self
    }

    pub fn with_varying(mut self, primitive: Primitive, name: impl Into<String>) -> Self {
        self.varyings.push(VaryingDeclaration {
            primitive,
            name: name.into(),
        });
        self
    }

    pub fn with_constant(mut self, constant: ConstantDeclaration) -> Self {
        self.constants.push(constant);
        self
    }

    pub fn with_function(mut self, function: FunctionDeclaration) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_stage(mut self, stage: StageDeclaration) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn has_stage(&self, kind: ShaderKind) -> bool {
        self.stages.iter().any(|stage| stage.kind == kind)
    }
}

/// Represents a parsed shader program, ready for interrogation and compilation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaderDeclaration {
    pub path: String,
    pub compilation_unit: CompilationUnit,
}

impl ShaderDeclaration {
    pub fn new(path: impl Into<String>, compilation_unit: CompilationUnit) -> Self {
        Self {
            path: path.into(),
            compilation_unit,
        }
    }
}
