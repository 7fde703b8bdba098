//
// main.rs
//
// `heron` command-line entry point
//

use std::env;

use heron::cli::expand;

fn print_usage() {
    println!(
        "heron {}, COBOL copybook expansion and semantic linking.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: heron <COMMAND> [OPTIONS]

Commands:

expand <path>                Expand the copybooks of a program, or of every
                             .cbl/.cob/.cobol file below a directory
  --copybooks <dir>          Copybook search path (repeatable, in probe order)
  --mode <mode>              enabled | disabled | skip
  --sql-backend <backend>    none | db2 | datacom
  --settings <file>          JSON settings with `copybooks` and `diagnostics` sections
  --json                     Print a JSON report instead of the expanded text

Available options:

--version                    Print the version
--help                       Print this help message

"#
    );
}

fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name

    let Some(command) = argv.next() else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "--version" => {
            println!("heron {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "--help" => {
            print_usage();
            Ok(())
        }
        "expand" => {
            env_logger::init();
            let args = expand::parse_args(&mut argv).map_err(|e| anyhow::anyhow!(e))?;
            let reports = expand::run_expand(&args)?;
            if args.json {
                expand::print_json(&reports)
            } else {
                expand::print_text(&reports);
                Ok(())
            }
        }
        other => Err(anyhow::anyhow!("Unknown argument: '{other}'")),
    }
}
