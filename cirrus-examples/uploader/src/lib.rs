mod app;
mod commands;

use anyhow::Result;

pub use app::UploaderApp;
pub use commands::{scale, Command, USAGE};

/// Run one command. Everything except `scale` needs `CLOUDINARY_URL`.
pub async fn run(command: Command) -> Result<()> {
    match command {
        Command::Scale {
            width,
            height,
            url,
            max,
        } => {
            println!("{}", scale(width, height, &url, max)?);
        }
        Command::UploadImage { path } => {
            let app = UploaderApp::from_env()?;
            let result = app.upload_image(&path).await?;
            println!("{}", summary(&result));
        }
        Command::UploadVideo { path, preset } => {
            let app = UploaderApp::from_env()?;
            let result = app.upload_video(&path, preset).await?;
            println!("{}", summary(&result));
        }
        Command::Remove { url } => {
            let app = UploaderApp::from_env()?;
            app.remove(&url).await?;
            println!("removed {url}");
        }
    }
    Ok(())
}

fn summary(result: &cirrus_upload::UploadResult) -> String {
    match result.url() {
        Some(url) => format!(
            "ok {url} {}x{}",
            result.width().unwrap_or_default(),
            result.height().unwrap_or_default()
        ),
        None => "failed".to_string(),
    }
}
