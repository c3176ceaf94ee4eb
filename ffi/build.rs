//! Generates `include/courier.h` from the `extern "C"` surface.

fn main() {
    println!("cargo:rerun-if-changed=src");

    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let generated = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("COURIER_FFI_H")
        .with_cpp_compat(true)
        .generate();

    match generated {
        Ok(bindings) => {
            bindings.write_to_file(format!("{crate_dir}/include/courier.h"));
        }
        Err(err) => println!("cargo:warning=header not generated: {err}"),
    }
}
