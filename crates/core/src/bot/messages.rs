//! Replies the bot sends to drivers (Telegram Markdown).

pub const START_HELP: &str = "👋 *Welcome to Fleetillo Dispatch Bot!*

To link your Telegram account, please use the registration link provided by your dispatcher.

If you received a QR code or link, please scan or click it to register.";

pub const INVALID_LINK: &str = "❌ *Invalid registration link*

The registration link appears to be invalid. Please contact your dispatcher.";

pub const DRIVER_NOT_FOUND: &str = "❌ *Driver not found*

We couldn't find a driver account with this ID. Please contact your dispatcher.";

pub const REGISTRATION_FAILED: &str = "❌ *Registration failed*

We encountered an error linking your account. Please try again or contact your dispatcher.";

pub const ACKNOWLEDGED: &str = "✅ Dispatch acknowledged!";

pub const NOT_ACKNOWLEDGED: &str = "⚠️ This dispatch could not be acknowledged";

pub fn already_registered(first_name: &str) -> String {
    format!(
        "✅ *Already registered!*

Your Telegram is already linked to your driver account, {}. You will receive dispatch notifications here.",
        first_name
    )
}

pub fn welcome(first_name: &str) -> String {
    format!(
        "🎉 *Welcome to Fleetillo Dispatch, {}!*

Your Telegram is now linked to your driver account.

You will receive route assignments and dispatch notifications here.

If you have any questions, please contact your dispatcher.",
        first_name
    )
}
