// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs;
use std::io::{Write as _, stdout};
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::Context as _;
use argh::FromArgs;
use backtrack_nfa::{Builder, BuilderConfig, ExecConfig, Executor, Hir, Nfa, Search};
use serde::Deserialize;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(description = "Debug frontend for the backtracking NFA executor")]
struct Command {
    #[argh(subcommand)]
    sub: SubCommands,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommands {
    Dump(SubCommandDump),
    Match(SubCommandMatch),
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "dump", description = "Print the NFA of a pattern file")]
struct SubCommandDump {
    #[argh(positional, description = "pattern .json file")]
    pattern: PathBuf,
    #[argh(switch, description = "print a mermaid flowchart instead of text")]
    mermaid: bool,
    #[argh(switch, description = "build the NFA for backward matching")]
    backward: bool,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "match", description = "Run a pattern file against some text")]
struct SubCommandMatch {
    #[argh(positional, description = "pattern .json file")]
    pattern: PathBuf,
    #[argh(positional, description = "input text")]
    text: String,
    #[argh(switch, description = "only match at the start offset")]
    anchored: bool,
    #[argh(switch, description = "match right-to-left, ending at the start offset")]
    backward: bool,
    #[argh(option, description = "start offset in code points (default: 0, or the end with --backward)")]
    from: Option<usize>,
}

/// A pattern file: `{ "pattern": <hir>, "builder": {...}, "exec": {...} }`.
#[derive(Deserialize)]
struct PatternFile {
    pattern: Hir,
    #[serde(default)]
    builder: BuilderConfig,
    #[serde(default)]
    exec: ExecConfig,
}

impl PatternFile {
    fn read(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    fn build(&self, backward: bool) -> anyhow::Result<Nfa> {
        let builder = Builder::with_config(self.builder.clone());
        let nfa = if backward { builder.build_reverse(&self.pattern) } else { builder.build(&self.pattern) };
        Ok(nfa?)
    }
}

pub fn main() {
    if let Err(e) = run() {
        eprintln!("{e:#}");
        exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let command: Command = argh::from_env();

    match &command.sub {
        SubCommands::Dump(cmd) => {
            let file = PatternFile::read(&cmd.pattern)?;
            let nfa = file.build(cmd.backward)?;
            let output = if cmd.mermaid { nfa.as_mermaid() } else { nfa.to_string() };
            _ = stdout().write_all(output.as_bytes());
        }
        SubCommands::Match(cmd) => run_match(cmd)?,
    }

    Ok(())
}

fn run_match(cmd: &SubCommandMatch) -> anyhow::Result<()> {
    let file = PatternFile::read(&cmd.pattern)?;
    let nfa = file.build(cmd.backward)?;
    let executor = Executor::with_config(nfa, file.exec);

    let input: Vec<char> = cmd.text.chars().collect();
    let mut search = Search::at(cmd.from.unwrap_or(if cmd.backward { input.len() } else { 0 }));
    search = search.anchored(cmd.anchored);
    if cmd.backward {
        search = search.backward();
    }

    let (result, stats) = executor.execute_with_stats(&input[..], search);
    let mut out = stdout().lock();

    match result? {
        Some(captures) => {
            for group in 0..captures.group_count() {
                match captures.get(group) {
                    Some(range) => {
                        let text: String = input[range.clone()].iter().collect();
                        _ = writeln!(out, "{group}: {}..{} {text:?}", range.start, range.end);
                    }
                    None => {
                        _ = writeln!(out, "{group}: -");
                    }
                }
            }
        }
        None => {
            _ = writeln!(out, "no match");
        }
    }

    _ = writeln!(
        out,
        "steps: {}, pushes: {}, pops: {}, results: {}, max depth: {}, grows: {}",
        stats.steps, stats.pushes, stats.pops, stats.result_pushes, stats.max_depth, stats.grows
    );
    Ok(())
}
