fn main() {
    let embeddings = if cfg!(feature = "semantic") {
        "semantic model with statistical fallback"
    } else {
        "statistical"
    };
    println!("cargo:rustc-env=ATLAS_EMBEDDINGS={embeddings}");
}
