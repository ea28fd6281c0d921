/// Accumulates GLSL source one line at a time, indenting by the current
/// block depth.
#[derive(Debug, Default)]
pub struct ShaderCodeBuilder {
    source: String,
    indent: usize,
}

impl ShaderCodeBuilder {
    const INDENT: &'static str = "  ";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn indent_level(&self) -> usize {
        self.indent
    }

    pub fn append_line(&mut self, line: &str) {
        for _ in 0..self.indent {
            self.source.push_str(Self::INDENT);
        }
        self.source.push_str(line);
        self.source.push('\n');
    }

    pub fn append_blank_line(&mut self) {
        self.source.push('\n');
    }

    pub fn append_comment(&mut self, text: &str) {
        self.append_line(&format!("// {}", text));
    }

    /// `uniform`, `varying` and friends: `<keyword> [precision ]<type> <name>;`
    pub fn append_declaration(
        &mut self,
        keyword: &str,
        precision: Option<&str>,
        ty: &str,
        name: &str,
    ) {
        let line = match precision {
            Some(precision) => format!("{} {} {} {};", keyword, precision, ty, name),
            None => format!("{} {} {};", keyword, ty, name),
        };
        self.append_line(&line);
    }

    pub fn append_constant(&mut self, precision: Option<&str>, ty: &str, name: &str, value: &str) {
        let line = match precision {
            Some(precision) => format!("const {} {} {} = {};", precision, ty, name, value),
            None => format!("const {} {} = {};", ty, name, value),
        };
        self.append_line(&line);
    }

    /// Writes `header` followed by an opening brace and indents what follows.
    pub fn begin_block(&mut self, header: &str) {
        self.append_line(header);
        self.append_line("{");
        self.indent += 1;
    }

    pub fn end_block(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.append_line("}");
    }

    pub fn finish(self) -> String {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_indent_their_body() {
        let mut builder = ShaderCodeBuilder::new();
        builder.begin_block("void main()");
        builder.append_comment("body");
        builder.begin_block("if (true)");
        builder.append_line("discard;");
        builder.end_block();
        builder.end_block();

        assert_eq!(builder.indent_level(), 0);
        assert_eq!(
            builder.finish(),
            "void main()\n{\n  // body\n  if (true)\n  {\n    discard;\n  }\n}\n"
        );
    }

    #[test]
    fn test_declarations() {
        let mut builder = ShaderCodeBuilder::new();
        builder.append_declaration("uniform", Some("highp"), "vec3", "light");
        builder.append_declaration("varying", None, "vec2", "uv");
        builder.append_blank_line();
        builder.append_constant(None, "float", "PI", "3.14");

        assert_eq!(
            builder.finish(),
            "uniform highp vec3 light;\nvarying vec2 uv;\n\nconst float PI = 3.14;\n"
        );
    }
}
