//! ---
//! jl_section: "05-boundary-contracts"
//! jl_subsection: "build"
//! jl_type: "source"
//! jl_scope: "build"
//! jl_description: "Compiles the control-plane and repository contracts."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let protoc = protoc_bin_vendored::protoc_bin_path()?;
    std::env::set_var("PROTOC", protoc);

    println!("cargo:rerun-if-changed=proto/ctl.proto");
    println!("cargo:rerun-if-changed=proto/repo.proto");
    println!("cargo:rerun-if-changed=proto");

    // Both contracts omit a proto package so the generated services answer on
    // `/Control/...` and `/Repo/...`; prost merges them into a single `_.rs`.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile(&["proto/ctl.proto", "proto/repo.proto"], &["proto"])?;
    Ok(())
}
