//! Print what the pipeline derives from one or more wheel filenames.
//!
//! `cargo run -p wheelfix-schema --example inspect -- foo-1.0-cp311-cp311-linux_ppc64le.whl`

use wheelfix_schema::WheelFilename;

fn main() -> anyhow::Result<()> {
    let names: Vec<String> = std::env::args().skip(1).collect();
    if names.is_empty() {
        anyhow::bail!("usage: inspect <wheel-filename>...");
    }

    for name in &names {
        let wheel = WheelFilename::parse(name)?;
        println!("{wheel}");
        println!("  package:      {}", wheel.package());
        println!("  version:      {}", wheel.version());
        println!("  python tag:   {}", wheel.python_tag());
        println!("  abi tag:      {}", wheel.abi_tag());
        println!("  platform tag: {}", wheel.platform_tag());
        match wheel.interpreter_tag() {
            Some(tag) => match tag.version() {
                Some(version) => println!("  interpreter:  {tag} (python {version})"),
                None => println!("  interpreter:  {tag}"),
            },
            None => println!("  interpreter:  (none)"),
        }
        println!("  pure:         {}", wheel.is_platform_independent());
        println!("  stable abi:   {}", wheel.is_stable_abi());
    }

    Ok(())
}
