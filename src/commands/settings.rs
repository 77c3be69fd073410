use crate::models::AppSettings;
use crate::runtime::CoreRuntime;

use super::CommandResult;

pub async fn load_settings(rt: &CoreRuntime) -> CommandResult<AppSettings> {
    Ok(rt.settings.lock().unwrap().clone())
}

pub async fn save_settings(rt: &CoreRuntime, settings: AppSettings) -> CommandResult<()> {
    rt.storage.save_settings(&settings)?;
    *rt.settings.lock().unwrap() = settings;
    Ok(())
}
