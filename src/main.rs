fn main() -> anyhow::Result<()> {
    roadscape::run(roadscape::SceneConfig::from_env())
}
