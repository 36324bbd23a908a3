use std::fs;

fn main() {
    // The register map is embedded with `include_str!`; rebuild when it changes
    // and fail early if the file is not even syntactically valid TOML.
    println!("cargo:rerun-if-changed=src/registers.toml");
    let Ok(text) = fs::read_to_string("src/registers.toml") else {
        println!("cargo:warning=src/registers.toml not found");
        return;
    };
    if let Err(e) = text.parse::<toml::Table>() {
        panic!("src/registers.toml is not valid TOML: {e}");
    }
}
