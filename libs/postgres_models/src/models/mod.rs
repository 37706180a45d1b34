mod account;
mod withdraw;
mod withdraw_pix;

pub use account::Account;
pub use withdraw::{NewWithdraw, Withdraw, WithdrawSettlement};
pub use withdraw_pix::{NewWithdrawPix, WithdrawPix};
