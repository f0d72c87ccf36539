use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use lindex::Index;

#[derive(Debug, StructOpt)]
#[structopt(name = "create", about = "Bulk-build an index from an existing data file")]
struct CommandLineArgs {
    #[structopt(parse(from_os_str))]
    data_file: PathBuf,

    #[structopt(parse(from_os_str))]
    index_file: PathBuf,

    key_size: usize,
}

fn main() {
    env_logger::init();
    let opts = CommandLineArgs::from_args();

    match Index::create(&opts.data_file, opts.key_size, &opts.index_file) {
        Ok((index, duplicates)) => {
            for dup in &duplicates {
                println!(
                    "duplicate key {:?} at offset {} (first seen at offset {}), skipped",
                    String::from_utf8_lossy(&dup.key),
                    dup.duplicate_offset,
                    dup.first_offset
                );
            }
            if let Err(e) = index.close() {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}
