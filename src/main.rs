#[tokio::main]
async fn main() -> anyhow::Result<()> {
    goal_tracker_oauth::app::run().await
}
