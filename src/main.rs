mod codegen;
mod frontend;
mod ir;

use std::path::{Path, PathBuf};
use std::process::Command;
use std::{env, fs};

use crate::frontend::token_dumper::TokenDumper;
use crate::ir::Program;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.contains(&"-h".to_string()) || args.contains(&"--help".to_string()) {
        print_usage();
        return;
    }

    let tokens_only = args.contains(&"--tokens".to_string());
    let no_color = args.contains(&"--no-color".to_string());
    let show_ir = args.contains(&"--ir".to_string());
    let emit_ir = args.contains(&"--emit-ir".to_string());
    let asm_only = args.contains(&"-S".to_string()) || args.contains(&"--asm-only".to_string());

    // first non-flag argument is the filename
    let filename = args.iter().skip(1).find(|a| !a.starts_with('-'));

    match filename {
        Some(filename) => {
            ensure_extension(filename);
            match fs::read_to_string(filename) {
                Ok(source) => {
                    if tokens_only {
                        dump_tokens(&source, filename, no_color);
                    } else {
                        compile_file(&source, filename, show_ir, emit_ir, asm_only);
                    }
                }
                Err(e) => {
                    eprintln!("Failed to read '{}': {}", filename, e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            print_usage();
            std::process::exit(1);
        }
    }
}

fn ensure_extension(filename: &str) {
    let path = Path::new(filename);
    if path.extension().and_then(|e| e.to_str()) != Some("tack") {
        eprintln!("Error: expected a .tack file, got {}", filename);
        std::process::exit(1);
    }
}

fn dump_tokens(source: &str, filename: &str, no_color: bool) {
    match frontend::lexer::tokenize(source, filename) {
        Ok(tokens) => {
            let mut dumper = TokenDumper::new();

            if no_color {
                dumper = dumper.no_color();
            }

            dumper.dump(&tokens);
        }
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("TACK - Native Compiler for a Concatenative Stack Language");
    println!();
    println!("Usage:");
    println!("  tack <file.tack>           Compile and link an executable");
    println!("  tack --tokens <file.tack>  Show tokens only");
    println!("  tack --no-color            Disable color in token output");
    println!("  tack --ir <file.tack>      Print the instruction listing and stop");
    println!("  tack --emit-ir <file.tack> Also write the serialized program next to the input");
    println!("  tack -S, --asm-only        Stop after writing the .asm file");
    println!("  tack --help, -h            Show this help");
}

fn compile_file(source: &str, filename: &str, show_ir: bool, emit_ir: bool, asm_only: bool) {
    let tokens = match frontend::lexer::tokenize(source, filename) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            std::process::exit(1);
        }
    };

    let source_dir = Path::new(filename)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let program = match frontend::parser::parse(&tokens, &source_dir) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            std::process::exit(1);
        }
    };

    if show_ir {
        ir::disasm::print_program(&program);
        return;
    }

    if emit_ir {
        write_serialized_program(&program, filename);
    }

    let asm = codegen::generate(&program);
    let asm_path = Path::new(filename).with_extension("asm");
    if let Err(e) = fs::write(&asm_path, asm) {
        eprintln!("Failed to write '{}': {}", asm_path.display(), e);
        std::process::exit(1);
    }
    println!("wrote {}", asm_path.display());

    if asm_only {
        return;
    }

    let obj_path = Path::new(filename).with_extension("o");
    let exe_path = Path::new(filename).with_extension("");
    run_tool("nasm", &["-felf64".as_ref(), asm_path.as_os_str(), "-o".as_ref(), obj_path.as_os_str()]);
    run_tool("ld", &[obj_path.as_os_str(), "-o".as_ref(), exe_path.as_os_str()]);
    println!("wrote {}", exe_path.display());
}

fn write_serialized_program(program: &Program, filename: &str) {
    let ir_path = Path::new(filename).with_extension("ir");
    match postcard::to_allocvec(program) {
        Ok(bytes) => {
            if let Err(e) = fs::write(&ir_path, bytes) {
                eprintln!("Failed to write '{}': {}", ir_path.display(), e);
                std::process::exit(1);
            }
            println!("wrote {}", ir_path.display());
        }
        Err(e) => {
            eprintln!("Serialization error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_tool(tool: &str, args: &[&std::ffi::OsStr]) {
    match Command::new(tool).args(args).status() {
        Ok(status) if status.success() => {}
        Ok(status) => {
            eprintln!("{} exited with {}", tool, status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to run {}: {}", tool, e);
            std::process::exit(1);
        }
    }
}
