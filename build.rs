fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_file = "proto/piston.proto";
    println!("cargo:rerun-if-changed={}", proto_file);

    // Messages and ExecuteCodeService stubs both come from the .proto file
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&[proto_file], &["proto"])?;

    Ok(())
}
