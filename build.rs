// Embed git/cargo metadata; `GIT_COMMIT_HASH` is `None` outside a git checkout.
fn main() -> std::io::Result<()> {
    built::write_built_file()
}
