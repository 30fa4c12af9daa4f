//! Generates `courier.h` into `OUT_DIR`. Set `COURIER_HEADER_DIR` to also
//! copy it somewhere stable, e.g. a consumer's include path.

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-env-changed=COURIER_HEADER_DIR");

    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let Ok(out_dir) = std::env::var("OUT_DIR") else {
        println!("cargo:warning=OUT_DIR not set, skipping header generation");
        return;
    };

    let bindings = match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("COURIER_H")
        .with_documentation(true)
        .generate()
    {
        Ok(bindings) => bindings,
        Err(e) => {
            println!("cargo:warning=cbindgen failed: {e}");
            return;
        }
    };

    let header = PathBuf::from(out_dir).join("courier.h");
    bindings.write_to_file(&header);

    if let Ok(dir) = std::env::var("COURIER_HEADER_DIR") {
        let dest = PathBuf::from(dir).join("courier.h");
        if let Err(e) = std::fs::copy(&header, &dest) {
            println!("cargo:warning=cannot copy header to {}: {e}", dest.display());
        }
    }
}
