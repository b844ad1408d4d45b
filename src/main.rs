use anyhow::{Context, Result};
use es_filter::config::CompilerConfig;
use es_filter::request::{SearchOptions, SearchRequestBuilder};
use es_filter::token::Span;
use es_filter::{parse, Error, ParseError, QueryCompiler};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

/// 单条输入处理后是否继续
enum Flow {
    Continue,
    Quit,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    // 可选的第一个参数：JSON配置文件路径
    let config = match std::env::args().nth(1) {
        Some(path) => CompilerConfig::from_json_file(&path)
            .with_context(|| format!("无法加载配置文件 {}", path))?,
        None => CompilerConfig::default(),
    };
    let compiler = QueryCompiler::with_config(config);

    println!("--- es_filter: Filter 到搜索查询编译器 ---");
    println!("输入过滤表达式查看编译结果；:ast <filter> 查看 AST，:request <filter> 查看完整请求，:quit 退出");

    let mut editor = DefaultEditor::new().context("无法初始化行编辑器")?;
    loop {
        match editor.readline("es_filter> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                // 历史记录失败不影响编译
                let _ = editor.add_history_entry(line);

                if let Flow::Quit = run_command(&compiler, line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("读取输入失败"),
        }
    }

    Ok(())
}

/// 执行一行输入：命令或过滤表达式
fn run_command(compiler: &QueryCompiler, line: &str) -> Flow {
    if line == ":quit" || line == ":q" {
        return Flow::Quit;
    }

    if let Some(filter) = line.strip_prefix(":ast") {
        let filter = filter.trim();
        match parse(filter) {
            Ok(ast) => {
                println!("{:#?}", ast);
                println!("规范形式: {}", ast);
            }
            Err(e) => report(filter, &Error::Parse(e)),
        }
        return Flow::Continue;
    }

    if let Some(filter) = line.strip_prefix(":request") {
        let filter = filter.trim();
        let builder = SearchRequestBuilder::new(compiler);
        match builder.build(Some(filter), &SearchOptions::default()) {
            Ok(body) => print_json(&body),
            Err(e) => report(filter, &e),
        }
        return Flow::Continue;
    }

    match compiler.build(line) {
        Ok(query) => print_json(&query),
        Err(e) => report(line, &e),
    }
    Flow::Continue
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => println!("✗ 无法序列化结果: {}", e),
    }
}

/// 打印错误；语法错误额外标出出错位置
fn report(input: &str, err: &Error) {
    println!("✗ {}", err);
    if let Error::Parse(ParseError {
        span: Some(span), ..
    }) = err
    {
        println!("  {}", input);
        println!("  {}", caret_line(input, *span));
    }
}

/// 在出错位置下方画出 `^`；span 是字节偏移，需换算成字符列
fn caret_line(input: &str, span: Span) -> String {
    let columns = |range: &str| range.chars().count();
    let start = input.get(..span.start).map_or(span.start, columns);
    let width = input.get(span.start..span.end).map_or(1, columns).max(1);
    format!("{}{}", " ".repeat(start), "^".repeat(width))
}
