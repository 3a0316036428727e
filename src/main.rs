use mypool::models::db_config::PoolOptions;
use mypool::pool_manager::pool_mgr;
use mypool::{config, Value};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // 第一个参数为 JSON 配置文件路径，否则读取 MYSQL_* 环境变量
    let descriptor = match std::env::args().nth(1) {
        Some(path) => config::from_json_file(path)?,
        None => config::from_env()?,
    };
    let options = PoolOptions::new().min_connections(1).max_connections(4);

    let manager = pool_mgr();
    let session = manager.connect("main", descriptor, options).await?;

    let rows = session.execute_query("SELECT 1", &[]).await?;
    println!("{:?}", rows);

    let rows = session
        .execute_query("SELECT ? AS greeting", &[Value::from("hello")])
        .await?;
    println!("{:?}", rows);

    info!(status = ?session.status(), "pool status");
    manager.close_all().await;
    Ok(())
}
