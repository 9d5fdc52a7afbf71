const PROTOS: [&str; 3] = [
    "proto/tfplugin5.proto",
    "proto/grpc_controller.proto",
    "proto/health.proto",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile proto files without requiring a system protoc
    let file_descriptors = protox::compile(PROTOS, ["proto"])?;

    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .compile_fds(file_descriptors)?;

    // Re-run if proto files change
    for proto in PROTOS {
        println!("cargo:rerun-if-changed={proto}");
    }

    Ok(())
}
