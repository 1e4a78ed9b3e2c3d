pub mod omnilogic;
