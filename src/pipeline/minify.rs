//! Built-in minifier stages.
//!
//! Uses oxc for JavaScript and lightningcss for CSS. A file the parser
//! rejects passes through unminified: third-party syntax must not fail
//! a whole bundle build.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use super::{Next, ProcessingContext, Stage, StageId};
use crate::debug;

/// Minify JavaScript source code.
fn minify_js(source: &str) -> Option<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Some(code)
}

/// Minify CSS source code.
fn minify_css(source: &str) -> Option<String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(result.code)
}

/// JavaScript minification stage.
pub struct MinifyJs;

impl Stage for MinifyJs {
    fn id(&self) -> StageId {
        StageId::MinifyJs
    }

    fn process(&self, ctx: &mut ProcessingContext<'_>, next: Next<'_>) -> anyhow::Result<()> {
        match minify_js(&ctx.text) {
            Some(minified) => ctx.text = minified,
            None => debug!("build"; "js parse failed, keeping raw: {}", ctx.asset.path),
        }
        next.run(ctx)
    }
}

/// CSS minification stage.
pub struct MinifyCss;

impl Stage for MinifyCss {
    fn id(&self) -> StageId {
        StageId::MinifyCss
    }

    fn process(&self, ctx: &mut ProcessingContext<'_>, next: Next<'_>) -> anyhow::Result<()> {
        match minify_css(&ctx.text) {
            Some(minified) => ctx.text = minified,
            None => debug!("build"; "css parse failed, keeping raw: {}", ctx.asset.path),
        }
        next.run(ctx)
    }
}
